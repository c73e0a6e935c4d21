#![allow(missing_docs)]

pub(crate) mod form;
pub(crate) mod html;
pub(crate) mod http;
mod ledger;

pub(crate) use form::{
    assert_form_error_message, assert_form_input, assert_form_submit_button,
    assert_form_submit_button_with_text, assert_hx_endpoint, must_get_form,
};
pub(crate) use html::{assert_valid_html, parse_html_document, parse_html_fragment};
pub(crate) use http::{assert_hx_redirect, get_header};
pub(crate) use ledger::{
    account_type_id, create_test_account, create_test_user, create_test_user_named,
    insert_test_line, transaction_type_id,
};
