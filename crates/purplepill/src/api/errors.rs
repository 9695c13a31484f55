use core::error::Error;

/// Exposition server errors
#[derive(Debug, derive_more::Display)]
pub enum ServerError {
    #[display("Failed to bind {addr}: {message}")]
    Bind { addr: String, message: String },
}

impl Error for ServerError {}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn bind_error_names_the_address() {
        let err = ServerError::Bind {
            addr: "0.0.0.0:9531".to_string(),
            message: "Address already in use".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to bind 0.0.0.0:9531: Address already in use"
        );
    }
}
