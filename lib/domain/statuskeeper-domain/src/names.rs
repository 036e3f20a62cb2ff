/// Lookup key shared by alert policies, violations, components and overrides.
///
/// Policies and components are linked purely by name, so both sides go
/// through this before any map access.
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_lowercases() {
        assert_eq!(normalize_name("API Gateway"), "api gateway");
        assert_eq!(normalize_name("db"), "db");
    }

    #[test]
    fn test_normalize_keeps_group_prefix() {
        assert_eq!(normalize_name("Payments-Checkout"), "payments-checkout");
    }
}
