pub mod database;
pub mod models;
pub mod progress_repository;
pub mod token_repository;

pub use database::Database;
pub use models::{
    AllowListStatus, AllowListUpdate, Chain, L1Registration, L2Registration, TokenRecord,
    TokenUpdate,
};
pub use progress_repository::ProgressRepository;
pub use token_repository::TokenRepository;
