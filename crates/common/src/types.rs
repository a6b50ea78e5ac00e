use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a UUID-backed identifier newtype.
///
/// Wrapping the UUID gives each entity its own identifier type and keeps
/// a listing id from ever being passed where an order id is expected.
macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_id! {
    /// Identifier of an authenticated user.
    ///
    /// Issued by the authentication layer; the marketplace core trusts it
    /// and never mints one itself outside of tests.
    UserId
}

uuid_id! {
    /// Identifier of a seller.
    SellerId
}

uuid_id! {
    /// Identifier of a product (the catalog-level article, shared by all
    /// sellers offering it).
    ProductId
}

uuid_id! {
    /// Identifier of a listing: one seller's offer of one product, with its
    /// own price and stock.
    ///
    /// Derives `Ord` because checkout reserves stock in ascending listing-id
    /// order across all concurrent checkouts.
    ListingId
}

uuid_id! {
    /// Identifier of a user's cart (one per user, created lazily).
    CartId
}

uuid_id! {
    /// Identifier of a placed order.
    OrderId
}

uuid_id! {
    /// Identifier of a checkout attempt, used to correlate journaled
    /// reservations with the order they settle into.
    CheckoutId
}
