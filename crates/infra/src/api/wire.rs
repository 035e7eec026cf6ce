//! Wire representations of marketplace resources
//!
//! The API speaks camelCase JSON, nests product and variant data inside
//! listings, and sends amounts as strings or numbers depending on the
//! endpoint. These DTOs absorb those differences and convert into the domain
//! types the engine works with.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use stockx_domain::{
    CreateListingInput, ListingPage, ListingStatus, MarketData, Operation, OperationInput,
    OperationItem, OperationItemStatus, OperationKind, OperationStatus, Product, RemoteListing,
    Result, StockxError, UpdateListingInput,
};

/// Amount as the API accepts it: a decimal string without trailing zeros
pub fn format_amount(amount: f64) -> String {
    let cents = stockx_domain::to_cents(amount);
    if cents % 100 == 0 {
        (cents / 100).to_string()
    } else {
        format!("{}.{:02}", cents / 100, (cents % 100).abs())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Number(f64),
    Text(String),
}

fn parse_amount<E: serde::de::Error>(raw: RawAmount) -> std::result::Result<f64, E> {
    match raw {
        RawAmount::Number(value) => Ok(value),
        RawAmount::Text(text) => {
            text.trim().parse().map_err(|_| E::custom(format!("invalid amount: {text}")))
        }
    }
}

fn amount<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
    parse_amount(RawAmount::deserialize(deserializer)?)
}

fn optional_amount<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<f64>, D::Error> {
    Option::<RawAmount>::deserialize(deserializer)?.map(parse_amount).transpose()
}

fn status<T: std::str::FromStr<Err = String>>(raw: &str) -> Result<T> {
    raw.parse().map_err(StockxError::Decode)
}

/* -------------------------------------------------------------------------- */
/* Requests */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateListingBody {
    pub variant_id: String,
    pub amount: String,
    pub currency_code: String,
    pub quantity: u32,
    pub active: bool,
}

impl From<&CreateListingInput> for CreateListingBody {
    fn from(input: &CreateListingInput) -> Self {
        Self {
            variant_id: input.variant_id.clone(),
            amount: format_amount(input.amount),
            currency_code: input.currency.clone(),
            quantity: input.quantity,
            active: input.active,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateListingBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing_id: Option<String>,
    pub amount: String,
    pub currency_code: String,
}

impl UpdateListingBody {
    /// Body for `PATCH /selling/listings/{id}`, where the id is in the path
    pub fn single(input: &UpdateListingInput) -> Self {
        Self {
            listing_id: None,
            amount: format_amount(input.amount),
            currency_code: input.currency.clone(),
        }
    }

    /// Batch entry, which names its listing
    pub fn batch(input: &UpdateListingInput) -> Self {
        Self { listing_id: Some(input.listing_id.clone()), ..Self::single(input) }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteListingBody {
    pub listing_id: String,
}

#[derive(Debug, Serialize)]
pub struct BatchBody<T> {
    pub items: Vec<T>,
}

/* -------------------------------------------------------------------------- */
/* Listings */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductRef {
    pub product_id: String,
    pub product_name: Option<String>,
    pub style_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VariantRef {
    pub variant_id: String,
    pub variant_name: Option<String>,
    pub variant_value: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingDto {
    pub listing_id: String,
    pub status: String,
    #[serde(deserialize_with = "amount")]
    pub amount: f64,
    pub currency_code: String,
    #[serde(default)]
    pub product: ProductRef,
    #[serde(default)]
    pub variant: VariantRef,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl ListingDto {
    pub fn into_domain(self) -> Result<RemoteListing> {
        Ok(RemoteListing {
            status: status::<ListingStatus>(&self.status)?,
            listing_id: self.listing_id,
            variant_id: self.variant.variant_id,
            product_id: self.product.product_id,
            amount: self.amount,
            currency: self.currency_code,
            quantity: 1,
            style_id: self.product.style_id.filter(|s| !s.is_empty()),
            product_name: self.product.product_name.filter(|s| !s.is_empty()),
            variant_value: self.variant.variant_value.filter(|s| !s.is_empty()),
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingsPageDto {
    #[serde(default)]
    pub page_number: u32,
    #[serde(default)]
    pub has_next_page: bool,
    #[serde(default)]
    pub listings: Vec<ListingDto>,
}

impl ListingsPageDto {
    pub fn into_domain(self) -> Result<ListingPage> {
        let listings =
            self.listings.into_iter().map(ListingDto::into_domain).collect::<Result<_>>()?;
        Ok(ListingPage {
            listings,
            page_number: self.page_number,
            has_next_page: self.has_next_page,
        })
    }
}

/* -------------------------------------------------------------------------- */
/* Catalog */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketDataDto {
    pub product_id: String,
    pub variant_id: String,
    pub currency_code: String,
    #[serde(default, deserialize_with = "optional_amount")]
    pub lowest_ask_amount: Option<f64>,
    #[serde(default, deserialize_with = "optional_amount")]
    pub highest_bid_amount: Option<f64>,
    #[serde(default, deserialize_with = "optional_amount")]
    pub sell_faster_amount: Option<f64>,
    #[serde(default, deserialize_with = "optional_amount")]
    pub earn_more_amount: Option<f64>,
    #[serde(default, deserialize_with = "optional_amount")]
    pub flex_lowest_ask_amount: Option<f64>,
}

impl From<MarketDataDto> for MarketData {
    fn from(dto: MarketDataDto) -> Self {
        Self {
            product_id: dto.product_id,
            variant_id: dto.variant_id,
            currency: dto.currency_code,
            lowest_ask: dto.lowest_ask_amount,
            highest_bid: dto.highest_bid_amount,
            sell_faster: dto.sell_faster_amount,
            earn_more: dto.earn_more_amount,
            flex_lowest_ask: dto.flex_lowest_ask_amount,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDto {
    pub product_id: String,
    #[serde(default)]
    pub url_key: Option<String>,
    #[serde(default)]
    pub style_id: Option<String>,
    #[serde(default)]
    pub product_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
}

impl From<ProductDto> for Product {
    fn from(dto: ProductDto) -> Self {
        Self {
            product_id: dto.product_id,
            title: dto.title.unwrap_or_default(),
            style_id: dto.style_id.unwrap_or_default(),
            brand: dto.brand.unwrap_or_default(),
            product_type: dto.product_type.unwrap_or_default(),
            url_key: dto.url_key.unwrap_or_default(),
        }
    }
}

/* -------------------------------------------------------------------------- */
/* Operations */
/* -------------------------------------------------------------------------- */

/// Response of a single-listing mutation
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingOperationDto {
    #[serde(default)]
    pub listing_id: Option<String>,
    pub operation_id: String,
    pub operation_status: String,
    #[serde(default)]
    pub error: Option<String>,
}

impl ListingOperationDto {
    /// Single-listing operations carry their own input as the one entry.
    pub fn into_domain(self, kind: OperationKind, input: OperationInput) -> Result<Operation> {
        let status = status::<OperationStatus>(&self.operation_status)?;
        let item_status = match status {
            OperationStatus::Pending => OperationItemStatus::Queued,
            OperationStatus::Succeeded => OperationItemStatus::Completed,
            OperationStatus::Failed => OperationItemStatus::Failed,
        };
        Ok(Operation {
            operation_id: self.operation_id,
            kind,
            status,
            error: self.error.clone(),
            items: vec![OperationItem {
                input,
                status: item_status,
                listing_id: self.listing_id,
                error: self.error,
            }],
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchState {
    Queued,
    InProgress,
    Completed,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BatchItemCounts {
    pub queued: u32,
    pub completed: u32,
    pub failed: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStatusDto {
    pub batch_id: String,
    pub status: BatchState,
    #[serde(default)]
    pub total_items: u32,
    #[serde(default)]
    pub item_statuses: Option<BatchItemCounts>,
}

impl BatchStatusDto {
    pub fn is_finished(&self) -> bool {
        self.status == BatchState::Completed
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BatchItemResultDto {
    pub listing_id: Option<String>,
}

/// The input echo of a batch entry. Deletes echo `id` or `listingId`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListingInputEcho {
    #[serde(alias = "id")]
    pub listing_id: Option<String>,
    pub variant_id: Option<String>,
    #[serde(deserialize_with = "optional_amount")]
    pub amount: Option<f64>,
    pub currency_code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemDto {
    #[serde(default)]
    pub item_id: Option<String>,
    pub status: String,
    #[serde(default)]
    pub result: Option<BatchItemResultDto>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub listing_input: ListingInputEcho,
}

impl BatchItemDto {
    fn into_domain(self, kind: OperationKind, default_currency: &str) -> Result<OperationItem> {
        let echo = self.listing_input;
        let missing = |field: &str| StockxError::Decode(format!("batch entry echo without {field}"));
        let input = match kind {
            OperationKind::Create => OperationInput::Create {
                variant_id: echo.variant_id.ok_or_else(|| missing("variantId"))?,
                amount: echo.amount.ok_or_else(|| missing("amount"))?,
                currency: echo.currency_code.unwrap_or_else(|| default_currency.to_string()),
            },
            OperationKind::Update => OperationInput::Update {
                listing_id: echo.listing_id.ok_or_else(|| missing("listingId"))?,
                amount: echo.amount.ok_or_else(|| missing("amount"))?,
            },
            OperationKind::Delete => OperationInput::Delete {
                listing_id: echo.listing_id.ok_or_else(|| missing("listingId"))?,
            },
        };
        Ok(OperationItem {
            status: status::<OperationItemStatus>(&self.status)?,
            listing_id: self
                .result
                .and_then(|result| result.listing_id)
                .or_else(|| input.listing_id().map(str::to_string)),
            input,
            error: self.error.filter(|e| !e.is_empty()),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct BatchItemsDto {
    #[serde(default)]
    pub items: Vec<BatchItemDto>,
}

/// Fold a batch's status and, once finished, its entries into an
/// [`Operation`]. A finished batch with any failed entry is `Failed`.
pub fn batch_operation(
    kind: OperationKind,
    status: BatchStatusDto,
    items: Option<BatchItemsDto>,
    default_currency: &str,
) -> Result<Operation> {
    if !status.is_finished() {
        return Ok(Operation::pending(status.batch_id, kind));
    }

    let items = items
        .map(|dto| {
            dto.items
                .into_iter()
                .map(|item| item.into_domain(kind, default_currency))
                .collect::<Result<Vec<_>>>()
        })
        .transpose()?
        .unwrap_or_default();

    let failed = items.iter().filter(|item| item.is_failed()).count();
    let (op_status, error) = if failed == 0 {
        (OperationStatus::Succeeded, None)
    } else {
        (OperationStatus::Failed, Some(format!("{failed} of {} entries failed", items.len())))
    };

    Ok(Operation { operation_id: status.batch_id, kind, status: op_status, error, items })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_amount_formatting() {
        assert_eq!(format_amount(150.0), "150");
        assert_eq!(format_amount(99.5), "99.50");
        assert_eq!(format_amount(0.07), "0.07");
    }

    #[test]
    fn test_listing_with_string_amount() {
        let dto: ListingDto = serde_json::from_value(json!({
            "listingId": "l1",
            "status": "ACTIVE",
            "amount": "125",
            "currencyCode": "USD",
            "product": {"productId": "p1", "productName": "Dunk Low", "styleId": "DD1391-100"},
            "variant": {"variantId": "v1", "variantValue": "10"},
            "createdAt": "2024-01-01T00:00:00Z"
        }))
        .unwrap();

        let listing = dto.into_domain().unwrap();
        assert_eq!(listing.amount, 125.0);
        assert_eq!(listing.status, ListingStatus::Active);
        assert_eq!(listing.variant_id, "v1");
        assert_eq!(listing.style_id.as_deref(), Some("DD1391-100"));
        assert!(listing.created_at.is_some());
    }

    #[test]
    fn test_unknown_listing_status_is_decode_error() {
        let dto: ListingDto = serde_json::from_value(json!({
            "listingId": "l1", "status": "SOMETHING", "amount": 1, "currencyCode": "USD"
        }))
        .unwrap();
        assert!(matches!(dto.into_domain(), Err(StockxError::Decode(_))));
    }

    #[test]
    fn test_market_data_amounts() {
        let dto: MarketDataDto = serde_json::from_value(json!({
            "productId": "p1",
            "variantId": "v1",
            "currencyCode": "USD",
            "lowestAskAmount": "110",
            "highestBidAmount": 95,
            "sellFasterAmount": null
        }))
        .unwrap();

        let market = MarketData::from(dto);
        assert_eq!(market.lowest_ask, Some(110.0));
        assert_eq!(market.highest_bid, Some(95.0));
        assert_eq!(market.sell_faster, None);
        assert_eq!(market.earn_more, None);
    }

    #[test]
    fn test_unfinished_batch_is_pending() {
        let status: BatchStatusDto =
            serde_json::from_value(json!({"batchId": "b1", "status": "IN_PROGRESS", "totalItems": 2}))
                .unwrap();
        let operation = batch_operation(OperationKind::Update, status, None, "USD").unwrap();
        assert_eq!(operation.status, OperationStatus::Pending);
        assert!(operation.items.is_empty());
    }

    #[test]
    fn test_finished_batch_with_failed_entry() {
        let status: BatchStatusDto =
            serde_json::from_value(json!({"batchId": "b1", "status": "COMPLETED", "totalItems": 2}))
                .unwrap();
        let items: BatchItemsDto = serde_json::from_value(json!({"items": [
            {"itemId": "1", "status": "COMPLETED", "result": {"listingId": "new-1"},
             "listingInput": {"variantId": "v1", "amount": "100", "currencyCode": "USD"}},
            {"itemId": "2", "status": "FAILED", "error": "variant not sellable",
             "listingInput": {"variantId": "v2", "amount": "90"}}
        ]}))
        .unwrap();

        let operation = batch_operation(OperationKind::Create, status, Some(items), "EUR").unwrap();

        assert_eq!(operation.status, OperationStatus::Failed);
        assert_eq!(operation.items[0].listing_id.as_deref(), Some("new-1"));
        assert_eq!(
            operation.items[1].input,
            OperationInput::Create { variant_id: "v2".into(), amount: 90.0, currency: "EUR".into() }
        );
        assert_eq!(operation.items[1].error.as_deref(), Some("variant not sellable"));
    }

    #[test]
    fn test_delete_echo_accepts_id_alias() {
        let item: BatchItemDto = serde_json::from_value(json!({
            "status": "COMPLETED", "listingInput": {"id": "l9"}
        }))
        .unwrap();
        let item = item.into_domain(OperationKind::Delete, "USD").unwrap();
        assert_eq!(item.input, OperationInput::Delete { listing_id: "l9".into() });
        assert_eq!(item.listing_id.as_deref(), Some("l9"));
    }
}
