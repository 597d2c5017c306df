use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoercionError {
    #[error("column '{column}' could not be decoded as {expected}: {source}")]
    Decode {
        column: String,
        expected: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("value of type {found} is not assignable to a {expected} column")]
    Incompatible {
        expected: String,
        found: &'static str,
    },
}
