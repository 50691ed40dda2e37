use serde::Serialize;

/// A purchasable bundle. Prices are whole rupees.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct CreditPackage {
    pub id: &'static str,
    pub name: &'static str,
    pub credits: i32,
    pub price: i64,
    pub currency: &'static str,
    /// Percentage saved relative to the base pack.
    pub savings: Option<u8>,
    pub popular: bool,
}

impl CreditPackage {
    /// Razorpay amounts are in the smallest unit (paise).
    pub fn amount_paise(&self) -> i64 {
        self.price * 100
    }

    pub fn price_per_credit(&self) -> f64 {
        self.price as f64 / self.credits as f64
    }
}

pub const CREDIT_PACKAGES: &[CreditPackage] = &[
    CreditPackage {
        id: "pack_10",
        name: "Starter Pack",
        credits: 10,
        price: 99,
        currency: "INR",
        savings: None,
        popular: false,
    },
    CreditPackage {
        id: "pack_25",
        name: "Basic Pack",
        credits: 25,
        price: 199,
        currency: "INR",
        savings: Some(15),
        popular: false,
    },
    CreditPackage {
        id: "pack_50",
        name: "Pro Pack",
        credits: 50,
        price: 349,
        currency: "INR",
        savings: Some(30),
        popular: true,
    },
    CreditPackage {
        id: "pack_100",
        name: "Premium Pack",
        credits: 100,
        price: 599,
        currency: "INR",
        savings: Some(40),
        popular: false,
    },
    CreditPackage {
        id: "pack_250",
        name: "Enterprise Pack",
        credits: 250,
        price: 1299,
        currency: "INR",
        savings: Some(50),
        popular: false,
    },
];

pub fn find_package(id: &str) -> Option<&'static CreditPackage> {
    CREDIT_PACKAGES.iter().find(|p| p.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_package() {
        let pack = find_package("pack_50").unwrap();
        assert_eq!(pack.credits, 50);
        assert!(pack.popular);
        assert_eq!(pack.amount_paise(), 34_900);
        assert!(find_package("pack_3").is_none());
    }

    #[test]
    fn test_exactly_one_popular_pack_and_cheaper_in_bulk() {
        assert_eq!(CREDIT_PACKAGES.iter().filter(|p| p.popular).count(), 1);
        let per_credit: Vec<f64> = CREDIT_PACKAGES.iter().map(|p| p.price_per_credit()).collect();
        assert!(per_credit.windows(2).all(|w| w[0] > w[1]));
    }
}
