pub mod collection;
pub mod favorites;
pub mod filters;
pub mod oras;
pub mod profiles;

pub async fn hello_ora() -> &'static str {
    "Hello from the Ora backend!"
}
