//! Defines functions for carrying the session token in a private cookie.

use axum_extra::extract::{
    PrivateCookieJar,
    cookie::{Cookie, SameSite},
};
use time::{Duration, OffsetDateTime};

use crate::auth::SessionToken;

/// The name of the cookie holding the session token.
pub(crate) const COOKIE_TOKEN: &str = "token";

/// Add the session token to the cookie jar, indicating that a user is logged in.
///
/// The cookie expires at the same time as the session.
///
/// Returns the cookie jar with the cookie added.
pub(crate) fn set_session_cookie(
    jar: PrivateCookieJar,
    token: &SessionToken,
    expires_at: OffsetDateTime,
) -> PrivateCookieJar {
    jar.add(
        Cookie::build((COOKIE_TOKEN, token.as_str().to_owned()))
            .expires(expires_at)
            .path("/")
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true),
    )
}

/// Set the session cookie to an invalid value and set its max age to zero, which should delete the cookie on the client side.
pub(crate) fn invalidate_session_cookie(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.add(
        Cookie::build((COOKIE_TOKEN, "deleted"))
            .expires(OffsetDateTime::UNIX_EPOCH)
            .max_age(Duration::ZERO)
            .path("/")
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true),
    )
}

/// Get the raw session token from the cookie jar, if there is one.
pub(crate) fn get_token_from_cookies(jar: &PrivateCookieJar) -> Option<String> {
    jar.get(COOKIE_TOKEN)
        .map(|cookie| cookie.value_trimmed().to_owned())
        .filter(|token| !token.is_empty() && token != "deleted")
}

#[cfg(test)]
mod cookie_tests {
    use axum_extra::extract::{PrivateCookieJar, cookie::Key};
    use sha2::{Digest, Sha512};
    use time::{Duration, OffsetDateTime, macros::datetime};

    use crate::auth::{
        SessionToken,
        cookie::{COOKIE_TOKEN, get_token_from_cookies, invalidate_session_cookie, set_session_cookie},
    };

    fn get_jar() -> PrivateCookieJar {
        let hash = Sha512::digest(b"foobar");
        let key = Key::from(&hash);

        PrivateCookieJar::new(key)
    }

    #[test]
    fn can_set_cookie() {
        let token = SessionToken::generate();
        let expires_at = datetime!(2025-06-01 12:30:00 UTC);

        let jar = set_session_cookie(get_jar(), &token, expires_at);
        let cookie = jar.get(COOKIE_TOKEN).unwrap();

        assert_eq!(cookie.value(), token.as_str());
        assert_eq!(cookie.expires_datetime(), Some(expires_at));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
    }

    #[test]
    fn get_token_from_cookie_succeeds() {
        let token = SessionToken::generate();
        let jar = set_session_cookie(get_jar(), &token, datetime!(2025-06-01 12:30:00 UTC));

        assert_eq!(get_token_from_cookies(&jar), Some(token.as_str().to_owned()));
    }

    #[test]
    fn get_token_from_empty_jar_returns_none() {
        assert_eq!(get_token_from_cookies(&get_jar()), None);
    }

    #[test]
    fn invalidate_session_cookie_succeeds() {
        let token = SessionToken::generate();
        let jar = set_session_cookie(get_jar(), &token, datetime!(2025-06-01 12:30:00 UTC));

        let jar = invalidate_session_cookie(jar);
        let cookie = jar.get(COOKIE_TOKEN).unwrap();

        assert_eq!(cookie.value(), "deleted");
        assert_eq!(cookie.expires_datetime(), Some(OffsetDateTime::UNIX_EPOCH));
        assert_eq!(cookie.max_age(), Some(Duration::ZERO));
        assert_eq!(get_token_from_cookies(&jar), None);
    }
}
