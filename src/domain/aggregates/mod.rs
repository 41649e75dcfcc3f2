//! Aggregates module
pub mod cart;
pub mod category;
pub mod coupon;
pub mod order;
pub mod product;
pub mod review;
pub mod settings;
pub mod support;
pub mod user;

pub use cart::{Cart, CartError, CartItem, CartSummary, MAX_LINE_QUANTITY};
pub use category::Category;
pub use coupon::{normalize_code, Coupon, CouponError, DiscountType};
pub use order::{CouponSnapshot, CustomerSummary, Order, OrderError, OrderItem, OrderStatus, PaymentMethod, ShippingAddress};
pub use product::{CategoryRef, Product, ProductError};
pub use review::{ProductSummary, Review, ReviewError};
pub use settings::{FlashSale, HeroSlide, SettingsSection, SiteSettings, TeamMember};
pub use support::{SupportTicket, TicketError, TicketStatus};
pub use user::{Address, CardError, CardType, NotificationPreferences, ProfileUpdate, SavedCard, UserProfile, WishlistEntry};
