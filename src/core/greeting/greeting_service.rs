//! A service for greeting someone.

use tracing::instrument;

/// Who gets greeted when no name is given.
const DEFAULT_NAME: &str = "World";

/// Returns a greeting based on someone's name.
///
/// An absent or empty name greets the whole world instead.
/// The name is used verbatim, without trimming or escaping.
///
/// ```
/// use greeting_service::core::greeting::greeting_service::greet;
///
/// assert_eq!("Hello, Alice!", greet(Some("Alice")));
/// assert_eq!("Hello, World!", greet(Some("")));
/// assert_eq!("Hello, World!", greet(None));
/// ```
#[instrument(ret)]
pub fn greet(name: Option<&str>) -> String {
    let name = name.filter(|name| !name.is_empty()).unwrap_or(DEFAULT_NAME);
    format!("Hello, {name}!")
}
