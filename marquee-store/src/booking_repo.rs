use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_core::booking::{Booking, BookingItem, BookingStatus, NewBooking, ShowSummary, UserSummary};
use marquee_core::repository::{BookingRepository, CatalogRepository};
use marquee_core::{CoreError, CoreResult};
use sqlx::PgPool;

fn db_err(err: sqlx::Error) -> CoreError {
    CoreError::StoreError(format!("database error: {}", err))
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct ShowRow {
    id: i64,
    movie_title: String,
    show_date_time: DateTime<Utc>,
    price: i64,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    email: Option<String>,
    user_name: Option<String>,
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: i64,
    order_id: String,
    user_id: String,
    show_id: i64,
    total_price: i64,
    payment_method: String,
    transaction_id: Option<String>,
    status: String,
    booking_date: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct BookingDetailRow {
    seat_number: String,
    price: i64,
}

const BOOKING_COLUMNS: &str =
    "id, order_id, user_id, show_id, total_price, payment_method, transaction_id, status, booking_date";

impl BookingRow {
    fn into_booking(self, details: Vec<BookingDetailRow>) -> CoreResult<Booking> {
        Ok(Booking {
            id: self.id,
            order_id: self.order_id,
            user_id: self.user_id,
            show_id: self.show_id,
            total_price: self.total_price,
            payment_method: self.payment_method,
            transaction_id: self.transaction_id,
            status: self.status.parse()?,
            booking_date: self.booking_date,
            items: details.into_iter()
                .map(|d| BookingItem { seat_number: d.seat_number, price: d.price })
                .collect(),
        })
    }
}

pub struct PgCatalogRepository {
    pool: PgPool,
}

impl PgCatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogRepository for PgCatalogRepository {
    async fn find_show(&self, show_id: i64) -> CoreResult<Option<ShowSummary>> {
        let row = sqlx::query_as::<_, ShowRow>(
            "SELECT id, movie_title, show_date_time, price FROM shows WHERE id = $1",
        )
        .bind(show_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(|r| ShowSummary {
            id: r.id,
            movie_title: r.movie_title,
            show_date_time: r.show_date_time,
            price: r.price,
        }))
    }

    async fn find_user(&self, user_id: &str) -> CoreResult<Option<UserSummary>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT id, email, user_name FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(row.map(|r| UserSummary { id: r.id, email: r.email, user_name: r.user_name }))
    }
}

pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_details(&self, booking_id: i64) -> CoreResult<Vec<BookingDetailRow>> {
        sqlx::query_as::<_, BookingDetailRow>(
            "SELECT seat_number, price FROM booking_details WHERE booking_id = $1 ORDER BY id",
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn hydrate(&self, row: Option<BookingRow>) -> CoreResult<Option<Booking>> {
        match row {
            Some(row) => {
                let details = self.load_details(row.id).await?;
                row.into_booking(details).map(Some)
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn create_booking(&self, booking: &NewBooking) -> CoreResult<Booking> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let insert = format!(
            "INSERT INTO bookings (order_id, user_id, show_id, total_price, payment_method, transaction_id, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            BOOKING_COLUMNS
        );
        let row = sqlx::query_as::<_, BookingRow>(&insert)
            .bind(&booking.order_id)
            .bind(&booking.user_id)
            .bind(booking.show_id)
            .bind(booking.total_price)
            .bind(&booking.payment_method)
            .bind(&booking.transaction_id)
            .bind(booking.status.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    CoreError::AlreadyBooked(booking.order_id.clone())
                }
                _ => db_err(e),
            })?;

        let mut details = Vec::with_capacity(booking.items.len());
        for item in &booking.items {
            sqlx::query("INSERT INTO booking_details (booking_id, seat_number, price) VALUES ($1, $2, $3)")
                .bind(row.id)
                .bind(&item.seat_number)
                .bind(item.price)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
            details.push(BookingDetailRow { seat_number: item.seat_number.clone(), price: item.price });
        }

        tx.commit().await.map_err(db_err)?;
        row.into_booking(details)
    }

    async fn get_booking(&self, id: i64) -> CoreResult<Option<Booking>> {
        let query = format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS);
        let row = sqlx::query_as::<_, BookingRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        self.hydrate(row).await
    }

    async fn find_by_order_id(&self, order_id: &str) -> CoreResult<Option<Booking>> {
        let query = format!("SELECT {} FROM bookings WHERE order_id = $1", BOOKING_COLUMNS);
        let row = sqlx::query_as::<_, BookingRow>(&query)
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        self.hydrate(row).await
    }

    async fn update_booking_status(&self, id: i64, status: BookingStatus) -> CoreResult<()> {
        let result = sqlx::query("UPDATE bookings SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("booking", id));
        }
        Ok(())
    }
}
