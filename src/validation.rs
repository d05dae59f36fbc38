/// Email that is refused at sign-in regardless of password.
const BLOCKED_EMAIL: &str = "blocked@example.com";

const MIN_PASSWORD_LEN: usize = 6;

/// Check login/register input before it reaches the identity provider.
///
/// Rules are checked in order and the first failure wins. Returns `None`
/// when the input is acceptable.
pub fn validate(email: &str, password: &str) -> Option<&'static str> {
    if !email.contains('@') {
        return Some("Invalid email format.");
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Some("Password must be at least 6 characters long.");
    }
    if email == BLOCKED_EMAIL {
        return Some("This email is blocked.");
    }
    None
}
