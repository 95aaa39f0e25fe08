/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and registration password rules
/// - [`jwt`]: JWT access and refresh tokens
/// - [`middleware`]: Bearer token extraction into an auth context
/// - [`authorization`]: Access-control policies evaluated per request
///
/// # Example
///
/// ```no_run
/// use softdesk_shared::auth::jwt::{create_token, Claims, TokenType};
/// use softdesk_shared::auth::password::{hash_password, verify_password};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("correct horse battery")?;
/// assert!(verify_password("correct horse battery", &hash)?);
///
/// let token = create_token(&Claims::new(Uuid::new_v4(), TokenType::Access), "secret")?;
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;
