//! Names of the business actions the selector can choose.

pub const GET_ORDER_STATUS: &str = "get_order_status";
pub const GET_PRODUCT_DETAILS: &str = "get_product_details";
pub const SEARCH_PRODUCTS: &str = "search_products";
pub const GET_PRODUCT_RECOMMENDATIONS: &str = "get_product_recommendations";
pub const GET_EARLY_RISERS_PROMOTION: &str = "get_early_risers_promotion";

pub const ALL: [&str; 5] = [
    GET_ORDER_STATUS,
    GET_PRODUCT_DETAILS,
    SEARCH_PRODUCTS,
    GET_PRODUCT_RECOMMENDATIONS,
    GET_EARLY_RISERS_PROMOTION,
];
