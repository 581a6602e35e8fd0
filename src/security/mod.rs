pub mod credentials;

pub use credentials::{
    CLIENT_ID_VAR, CLIENT_SECRET_VAR, Credentials, REFRESH_TOKEN_VAR, Redactor, mask_token,
};
