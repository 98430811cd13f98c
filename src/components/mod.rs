pub mod error_banner;
pub mod patient_card;
pub mod patient_form;
pub mod sidebar;
pub mod status_badge;
