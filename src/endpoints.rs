// Centralized endpoint catalog for the admin API

// Session endpoints. These are never subject to the refresh-and-replay
// mechanism: a 401/403 from any of them is a terminal authentication
// failure, not a trigger for refresh.
pub const LOGIN: &str = "/api/admin/login";
pub const REFRESH: &str = "/api/admin/refresh";
pub const LOGOUT: &str = "/api/admin/logout";

// Dashboard
pub const DASHBOARD_STATS: &str = "/api/admin/dashboard/stats";

// Users
pub const USERS: &str = "/api/admin/users";

pub fn user_by_id(id: &str) -> String {
    format!("/api/admin/users/{}", id)
}

// Products
pub const PRODUCTS: &str = "/api/admin/products";
pub const CREATE_PRODUCT: &str = "/api/products";

pub fn product_by_id(id: &str) -> String {
    format!("/api/products/{}", id)
}

// Orders
pub const ORDERS: &str = "/api/admin/orders";

pub fn order_status(id: &str) -> String {
    format!("/api/admin/orders/{}/status", id)
}

// Subscriptions
pub const SUBSCRIPTIONS: &str = "/api/admin/subscriptions";
pub const SUBSCRIPTION_PRODUCTS: &str = "/api/admin/subscription-products";

pub fn subscription_status(id: &str) -> String {
    format!("/api/admin/subscriptions/{}/status", id)
}

// Wallet
pub const WALLET_TRANSACTIONS: &str = "/api/admin/wallet-transactions";

pub fn wallet_transaction_status(id: &str) -> String {
    format!("/api/admin/wallet-transactions/{}/status", id)
}

/// True when `path` targets one of the session endpoints.
pub fn is_auth_endpoint(path: &str) -> bool {
    matches!(path, LOGIN | REFRESH | LOGOUT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_endpoints_are_recognized() {
        assert!(is_auth_endpoint(LOGIN));
        assert!(is_auth_endpoint(REFRESH));
        assert!(is_auth_endpoint(LOGOUT));
    }

    #[test]
    fn test_business_endpoints_are_not_auth() {
        assert!(!is_auth_endpoint(USERS));
        assert!(!is_auth_endpoint(DASHBOARD_STATS));
        assert!(!is_auth_endpoint(&user_by_id("42")));
    }

    #[test]
    fn test_parameterized_paths() {
        assert_eq!(order_status("7"), "/api/admin/orders/7/status");
        assert_eq!(product_by_id("p-1"), "/api/products/p-1");
        assert_eq!(
            wallet_transaction_status("tx-9"),
            "/api/admin/wallet-transactions/tx-9/status"
        );
    }
}
