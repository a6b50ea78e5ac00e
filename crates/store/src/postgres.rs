//! PostgreSQL-backed store implementation.
//!
//! All statements are plain runtime queries. The stock invariant is
//! enforced by a single conditional `UPDATE`, so the database row lock is
//! the only synchronization the ledger needs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    CartId, CheckoutId, ListingId, Money, OrderId, ProductId, SellerId, UserId,
};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::records::{
    Cart, CartLine, CheckoutRecord, CheckoutState, Listing, Order, OrderLine, OrderStatus,
    Product, ReservedLine, Seller,
};
use crate::traits::{Catalog, CartStore, CheckoutJournal, OrderStore, StockLedger};

/// PostgreSQL marketplace store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to the given database URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPool::connect(url).await?;
        Ok(Self { pool })
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    // Catalog mutation happens outside the core; these are the outside.

    /// Inserts a product.
    pub async fn insert_product(&self, product: &Product) -> Result<()> {
        sqlx::query("INSERT INTO products (id, name, brand, max_buy) VALUES ($1, $2, $3, $4)")
            .bind(product.id.as_uuid())
            .bind(&product.name)
            .bind(&product.brand)
            .bind(product.max_buy.map(|cap| cap as i32))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Inserts a seller.
    pub async fn insert_seller(&self, seller: &Seller) -> Result<()> {
        sqlx::query("INSERT INTO sellers (id, name) VALUES ($1, $2)")
            .bind(seller.id.as_uuid())
            .bind(&seller.name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Inserts a listing.
    pub async fn insert_listing(&self, listing: &Listing) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO listings (id, seller_id, product_id, price_cents, stock, active)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(listing.id.as_uuid())
        .bind(listing.seller_id.as_uuid())
        .bind(listing.product_id.as_uuid())
        .bind(listing.price.cents())
        .bind(listing.stock as i32)
        .bind(listing.active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Activates or deactivates a listing.
    pub async fn set_listing_active(&self, listing_id: ListingId, active: bool) -> Result<()> {
        let result = sqlx::query("UPDATE listings SET active = $2 WHERE id = $1")
            .bind(listing_id.as_uuid())
            .bind(active)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::ListingNotFound(listing_id));
        }
        Ok(())
    }

    fn row_to_listing(row: &PgRow) -> Result<Listing> {
        Ok(Listing {
            id: ListingId::from_uuid(row.try_get::<Uuid, _>("id")?),
            seller_id: SellerId::from_uuid(row.try_get::<Uuid, _>("seller_id")?),
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            price: Money::from_cents(row.try_get::<i64, _>("price_cents")?),
            stock: row.try_get::<i32, _>("stock")? as u32,
            active: row.try_get("active")?,
        })
    }

    fn row_to_order(row: &PgRow) -> Result<Order> {
        let status_str: String = row.try_get("status")?;
        let status = OrderStatus::from_str(&status_str).ok_or(StoreError::Corrupt {
            field: "order status",
            value: status_str,
        })?;
        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            total: Money::from_cents(row.try_get::<i64, _>("total_cents")?),
            status,
        })
    }
}

#[async_trait]
impl Catalog for PostgresStore {
    async fn listing(&self, id: ListingId) -> Result<Option<Listing>> {
        let row = sqlx::query(
            "SELECT id, seller_id, product_id, price_cents, stock, active FROM listings WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(|row| Self::row_to_listing(&row)).transpose()
    }

    async fn product(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query("SELECT id, name, brand, max_buy FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| {
            Ok(Product {
                id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
                name: row.try_get("name")?,
                brand: row.try_get("brand")?,
                max_buy: row.try_get::<Option<i32>, _>("max_buy")?.map(|cap| cap as u32),
            })
        })
        .transpose()
    }

    async fn seller(&self, id: SellerId) -> Result<Option<Seller>> {
        let row = sqlx::query("SELECT id, name FROM sellers WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| {
            Ok(Seller {
                id: SellerId::from_uuid(row.try_get::<Uuid, _>("id")?),
                name: row.try_get("name")?,
            })
        })
        .transpose()
    }
}

#[async_trait]
impl StockLedger for PostgresStore {
    async fn reserve(&self, listing_id: ListingId, quantity: u32) -> Result<()> {
        // The conditional update is the atomic check-and-decrement; the row
        // lock serializes concurrent reservations on the same listing.
        let result = sqlx::query(
            "UPDATE listings SET stock = stock - $2 WHERE id = $1 AND active AND stock >= $2",
        )
        .bind(listing_id.as_uuid())
        .bind(quantity as i32)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        // Distinguish a missing listing from a short or inactive one.
        let row = sqlx::query("SELECT stock, active FROM listings WHERE id = $1")
            .bind(listing_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            None => Err(StoreError::ListingNotFound(listing_id)),
            Some(row) => {
                let active: bool = row.try_get("active")?;
                let stock: i32 = row.try_get("stock")?;
                let available = if active { stock as u32 } else { 0 };
                tracing::debug!(%listing_id, requested = quantity, available, "reservation refused");
                Err(StoreError::InsufficientStock {
                    listing_id,
                    requested: quantity,
                    available,
                })
            }
        }
    }

    async fn release(&self, listing_id: ListingId, quantity: u32) -> Result<()> {
        let result = sqlx::query("UPDATE listings SET stock = stock + $2 WHERE id = $1")
            .bind(listing_id.as_uuid())
            .bind(quantity as i32)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::ListingNotFound(listing_id));
        }
        Ok(())
    }

    async fn max_allowed(&self, listing_id: ListingId) -> Result<u32> {
        let row = sqlx::query(
            r#"
            SELECT l.stock, l.active, p.max_buy
            FROM listings l
            JOIN products p ON p.id = l.product_id
            WHERE l.id = $1
            "#,
        )
        .bind(listing_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::ListingNotFound(listing_id))?;

        let active: bool = row.try_get("active")?;
        if !active {
            return Ok(0);
        }

        let stock = row.try_get::<i32, _>("stock")? as u32;
        let max_buy = row.try_get::<Option<i32>, _>("max_buy")?.map(|cap| cap as u32);
        Ok(match max_buy {
            Some(cap) => stock.min(cap),
            None => stock,
        })
    }
}

#[async_trait]
impl CartStore for PostgresStore {
    async fn cart_for_user(&self, user_id: UserId) -> Result<Cart> {
        // Lazy find-or-create; ON CONFLICT makes the race between two first
        // mutations by the same user harmless.
        sqlx::query("INSERT INTO carts (id, user_id) VALUES ($1, $2) ON CONFLICT (user_id) DO NOTHING")
            .bind(CartId::new().as_uuid())
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await?;

        let row = sqlx::query("SELECT id FROM carts WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .fetch_one(&self.pool)
            .await?;

        Ok(Cart {
            id: CartId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id,
        })
    }

    async fn line(&self, user_id: UserId, listing_id: ListingId) -> Result<Option<CartLine>> {
        let row = sqlx::query(
            r#"
            SELECT cl.cart_id, cl.listing_id, cl.quantity
            FROM cart_lines cl
            JOIN carts c ON c.id = cl.cart_id
            WHERE c.user_id = $1 AND cl.listing_id = $2
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(listing_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| Self::row_to_cart_line(&row)).transpose()
    }

    async fn put_line(
        &self,
        user_id: UserId,
        listing_id: ListingId,
        quantity: u32,
    ) -> Result<CartLine> {
        let cart = self.cart_for_user(user_id).await?;

        sqlx::query(
            r#"
            INSERT INTO cart_lines (cart_id, listing_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (cart_id, listing_id) DO UPDATE SET quantity = EXCLUDED.quantity
            "#,
        )
        .bind(cart.id.as_uuid())
        .bind(listing_id.as_uuid())
        .bind(quantity as i32)
        .execute(&self.pool)
        .await?;

        Ok(CartLine {
            cart_id: cart.id,
            listing_id,
            quantity,
        })
    }

    async fn remove_line(&self, user_id: UserId, listing_id: ListingId) -> Result<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM cart_lines cl
            USING carts c
            WHERE cl.cart_id = c.id AND c.user_id = $1 AND cl.listing_id = $2
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(listing_id.as_uuid())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::LineNotFound(listing_id));
        }
        Ok(())
    }

    async fn lines(&self, user_id: UserId) -> Result<Vec<CartLine>> {
        let rows = sqlx::query(
            r#"
            SELECT cl.cart_id, cl.listing_id, cl.quantity
            FROM cart_lines cl
            JOIN carts c ON c.id = cl.cart_id
            WHERE c.user_id = $1
            ORDER BY cl.listing_id
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_cart_line).collect()
    }

    async fn clear(&self, user_id: UserId) -> Result<()> {
        sqlx::query(
            r#"
            DELETE FROM cart_lines cl
            USING carts c
            WHERE cl.cart_id = c.id AND c.user_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

impl PostgresStore {
    fn row_to_cart_line(row: &PgRow) -> Result<CartLine> {
        Ok(CartLine {
            cart_id: CartId::from_uuid(row.try_get::<Uuid, _>("cart_id")?),
            listing_id: ListingId::from_uuid(row.try_get::<Uuid, _>("listing_id")?),
            quantity: row.try_get::<i32, _>("quantity")? as u32,
        })
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn insert_order(&self, order: &Order, lines: &[OrderLine]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, created_at, total_cents, status)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(order.created_at)
        .bind(order.total.cents())
        .bind(order.status.as_str())
        .execute(&mut *tx)
        .await?;

        for line in lines {
            sqlx::query(
                r#"
                INSERT INTO order_lines (order_id, listing_id, quantity, unit_price_cents)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(line.order_id.as_uuid())
            .bind(line.listing_id.as_uuid())
            .bind(line.quantity as i32)
            .bind(line.unit_price.cents())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(
            "SELECT id, user_id, created_at, total_cents, status FROM orders WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(|row| Self::row_to_order(&row)).transpose()
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, created_at, total_cents, status
            FROM orders
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_order).collect()
    }

    async fn order_lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>> {
        let rows = sqlx::query(
            r#"
            SELECT order_id, listing_id, quantity, unit_price_cents
            FROM order_lines
            WHERE order_id = $1
            ORDER BY listing_id
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(OrderLine {
                    order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
                    listing_id: ListingId::from_uuid(row.try_get::<Uuid, _>("listing_id")?),
                    quantity: row.try_get::<i32, _>("quantity")? as u32,
                    unit_price: Money::from_cents(row.try_get::<i64, _>("unit_price_cents")?),
                })
            })
            .collect()
    }
}

#[async_trait]
impl CheckoutJournal for PostgresStore {
    async fn open_checkout(&self, record: &CheckoutRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO checkouts (id, user_id, order_id, state, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.user_id.as_uuid())
        .bind(record.order_id.as_uuid())
        .bind(record.state.as_str())
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn journal_reservation(
        &self,
        checkout_id: CheckoutId,
        listing_id: ListingId,
        quantity: u32,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO checkout_reservations (checkout_id, listing_id, quantity)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(checkout_id.as_uuid())
        .bind(listing_id.as_uuid())
        .bind(quantity as i32)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn close_checkout(&self, checkout_id: CheckoutId, state: CheckoutState) -> Result<()> {
        let result = sqlx::query("UPDATE checkouts SET state = $2 WHERE id = $1")
            .bind(checkout_id.as_uuid())
            .bind(state.as_str())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::CheckoutNotFound(checkout_id));
        }
        Ok(())
    }

    async fn open_checkouts(&self) -> Result<Vec<CheckoutRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, order_id, state, created_at
            FROM checkouts
            WHERE state = 'reserving'
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let state_str: String = row.try_get("state")?;
            let state = CheckoutState::from_str(&state_str).ok_or(StoreError::Corrupt {
                field: "checkout state",
                value: state_str,
            })?;
            let id = CheckoutId::from_uuid(row.try_get::<Uuid, _>("id")?);

            let reservation_rows = sqlx::query(
                r#"
                SELECT listing_id, quantity
                FROM checkout_reservations
                WHERE checkout_id = $1
                ORDER BY listing_id
                "#,
            )
            .bind(id.as_uuid())
            .fetch_all(&self.pool)
            .await?;

            let reservations = reservation_rows
                .iter()
                .map(|row| {
                    Ok(ReservedLine {
                        listing_id: ListingId::from_uuid(row.try_get::<Uuid, _>("listing_id")?),
                        quantity: row.try_get::<i32, _>("quantity")? as u32,
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            records.push(CheckoutRecord {
                id,
                user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
                order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
                state,
                created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
                reservations,
            });
        }

        Ok(records)
    }
}
