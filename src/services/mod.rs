//! Application services. Each owns a handle to the document store and is
//! cheap to clone into request handlers.

pub mod account;
pub mod admin;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod settings;

pub use account::AccountService;
pub use admin::AdminService;
pub use auth::SessionService;
pub use cart::CartService;
pub use catalog::CatalogService;
pub use checkout::CheckoutService;
pub use settings::SiteSettingsService;
