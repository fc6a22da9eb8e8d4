//! Construction and signing of CTF exchange orders.

use alloy::primitives::{address, keccak256, Address, B256, U256};
use chrono::Utc;
use pm_core::types::{OrderType, Side};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::auth::WalletSigner;
use crate::eip712::{self, encode_address, encode_u256, encode_u8};
use crate::error::{PolymarketError, Result};
use crate::models::{OrderBook, OrderPayload};

pub const CTF_EXCHANGE: Address = address!("4bfb41d5b3570defd03c39a9a4d8de6bd8b8982e");
pub const NEG_RISK_CTF_EXCHANGE: Address = address!("c5d563a36ae78145c45a50134d48a1215220f80a");

const EXCHANGE_DOMAIN_NAME: &str = "Polymarket CTF Exchange";
const EXCHANGE_DOMAIN_VERSION: &str = "1";
const ORDER_TYPE: &str = "Order(uint256 salt,address maker,address signer,address taker,uint256 tokenId,uint256 makerAmount,uint256 takerAmount,uint256 expiration,uint256 nonce,uint256 feeRateBps,uint8 side,uint8 signatureType)";

/// Signature scheme of the maker wallet. Only plain EOAs are supported.
const SIGNATURE_TYPE_EOA: u8 = 0;
const TOKEN_DECIMALS: u32 = 6;

/// Decimal places for price, size and notional amount at a given tick size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundConfig {
    pub price: u32,
    pub size: u32,
    pub amount: u32,
}

pub fn round_config(tick_size: Decimal) -> Result<RoundConfig> {
    let config = match tick_size.normalize().to_string().as_str() {
        "0.1" => RoundConfig { price: 1, size: 2, amount: 3 },
        "0.01" => RoundConfig { price: 2, size: 2, amount: 4 },
        "0.001" => RoundConfig { price: 3, size: 2, amount: 5 },
        "0.0001" => RoundConfig { price: 4, size: 2, amount: 6 },
        other => {
            return Err(PolymarketError::InvalidOrder(format!(
                "unsupported tick size {other}"
            )))
        }
    };
    Ok(config)
}

/// Limit order parameters, price and size in outcome-token units.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderArgs {
    pub token_id: String,
    pub price: Decimal,
    pub size: Decimal,
    pub side: Side,
}

/// Market order parameters. `amount` is USDC to spend for BUY and shares to
/// sell for SELL; `price` is the worst acceptable price.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketOrderArgs {
    pub token_id: String,
    pub amount: Decimal,
    pub price: Decimal,
    pub side: Side,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedOrder {
    pub salt: u64,
    pub maker: Address,
    pub signer: Address,
    pub taker: Address,
    pub token_id: U256,
    pub maker_amount: U256,
    pub taker_amount: U256,
    pub expiration: U256,
    pub nonce: U256,
    pub fee_rate_bps: U256,
    pub side: Side,
    pub signature_type: u8,
}

impl UnsignedOrder {
    pub fn struct_hash(&self) -> B256 {
        let mut encoded = Vec::with_capacity(32 * 13);
        encoded.extend_from_slice(keccak256(ORDER_TYPE.as_bytes()).as_slice());
        encoded.extend_from_slice(&encode_u256(U256::from(self.salt)));
        encoded.extend_from_slice(&encode_address(self.maker));
        encoded.extend_from_slice(&encode_address(self.signer));
        encoded.extend_from_slice(&encode_address(self.taker));
        encoded.extend_from_slice(&encode_u256(self.token_id));
        encoded.extend_from_slice(&encode_u256(self.maker_amount));
        encoded.extend_from_slice(&encode_u256(self.taker_amount));
        encoded.extend_from_slice(&encode_u256(self.expiration));
        encoded.extend_from_slice(&encode_u256(self.nonce));
        encoded.extend_from_slice(&encode_u256(self.fee_rate_bps));
        encoded.extend_from_slice(&encode_u8(self.side.as_u8()));
        encoded.extend_from_slice(&encode_u8(self.signature_type));
        keccak256(&encoded)
    }

    pub fn signing_digest(&self, chain_id: u64, neg_risk: bool) -> B256 {
        eip712::typed_data_digest(
            exchange_domain_separator(chain_id, neg_risk),
            self.struct_hash(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedOrder {
    pub order: UnsignedOrder,
    pub signature: String,
}

impl SignedOrder {
    pub fn to_payload(&self) -> OrderPayload {
        let order = &self.order;
        OrderPayload {
            salt: order.salt,
            maker: order.maker.to_checksum(None),
            signer: order.signer.to_checksum(None),
            taker: order.taker.to_checksum(None),
            token_id: order.token_id.to_string(),
            maker_amount: order.maker_amount.to_string(),
            taker_amount: order.taker_amount.to_string(),
            expiration: order.expiration.to_string(),
            nonce: order.nonce.to_string(),
            fee_rate_bps: order.fee_rate_bps.to_string(),
            side: order.side,
            signature_type: order.signature_type,
            signature: self.signature.clone(),
        }
    }
}

pub fn exchange_domain_separator(chain_id: u64, neg_risk: bool) -> B256 {
    let contract = if neg_risk {
        NEG_RISK_CTF_EXCHANGE
    } else {
        CTF_EXCHANGE
    };
    eip712::domain_separator(
        EXCHANGE_DOMAIN_NAME,
        EXCHANGE_DOMAIN_VERSION,
        chain_id,
        Some(contract),
    )
}

pub struct OrderBuilder<'a> {
    signer: &'a WalletSigner,
}

impl<'a> OrderBuilder<'a> {
    pub fn new(signer: &'a WalletSigner) -> Self {
        Self { signer }
    }

    pub fn build_limit_order(
        &self,
        args: &OrderArgs,
        tick_size: Decimal,
        neg_risk: bool,
    ) -> Result<SignedOrder> {
        ensure_price_in_range(args.price, tick_size)?;
        let config = round_config(tick_size)?;
        let (maker_amount, taker_amount) =
            limit_order_amounts(args.side, args.size, args.price, config)?;
        self.sign(&args.token_id, args.side, maker_amount, taker_amount, neg_risk)
    }

    pub fn build_market_order(
        &self,
        args: &MarketOrderArgs,
        tick_size: Decimal,
        neg_risk: bool,
    ) -> Result<SignedOrder> {
        ensure_price_in_range(args.price, tick_size)?;
        let config = round_config(tick_size)?;
        let (maker_amount, taker_amount) =
            market_order_amounts(args.side, args.amount, args.price, config)?;
        self.sign(&args.token_id, args.side, maker_amount, taker_amount, neg_risk)
    }

    fn sign(
        &self,
        token_id: &str,
        side: Side,
        maker_amount: u128,
        taker_amount: u128,
        neg_risk: bool,
    ) -> Result<SignedOrder> {
        let token_id = U256::from_str_radix(token_id.trim(), 10).map_err(|_| {
            PolymarketError::InvalidOrder(format!("token id `{token_id}` is not a decimal integer"))
        })?;
        let address = self.signer.address();

        let order = UnsignedOrder {
            salt: generate_salt(),
            maker: address,
            signer: address,
            taker: Address::ZERO,
            token_id,
            maker_amount: U256::from(maker_amount),
            taker_amount: U256::from(taker_amount),
            expiration: U256::ZERO,
            nonce: U256::ZERO,
            fee_rate_bps: U256::ZERO,
            side,
            signature_type: SIGNATURE_TYPE_EOA,
        };

        let digest = order.signing_digest(self.signer.chain_id(), neg_risk);
        let signature = self.signer.sign_hash(&digest)?;
        Ok(SignedOrder { order, signature })
    }
}

/// Prices must sit strictly inside the book: `tick <= price <= 1 - tick`.
pub fn ensure_price_in_range(price: Decimal, tick_size: Decimal) -> Result<()> {
    if price < tick_size || price > Decimal::ONE - tick_size {
        return Err(PolymarketError::InvalidOrder(format!(
            "price {price} is outside [{tick_size}, {}]",
            Decimal::ONE - tick_size
        )));
    }
    Ok(())
}

/// `(maker_amount, taker_amount)` in 6-decimal token units for a limit order.
pub fn limit_order_amounts(
    side: Side,
    size: Decimal,
    price: Decimal,
    config: RoundConfig,
) -> Result<(u128, u128)> {
    let price = round_normal(price, config.price);
    let shares = round_down(size, config.size);
    let notional = shares
        .checked_mul(price)
        .map(|value| fit_amount(value, config.amount))
        .ok_or_else(|| out_of_range(size))?;

    let amounts = match side {
        Side::Buy => (to_token_units(notional)?, to_token_units(shares)?),
        Side::Sell => (to_token_units(shares)?, to_token_units(notional)?),
    };
    ensure_non_zero(amounts, size)
}

/// `(maker_amount, taker_amount)` in 6-decimal token units for a market order.
pub fn market_order_amounts(
    side: Side,
    amount: Decimal,
    price: Decimal,
    config: RoundConfig,
) -> Result<(u128, u128)> {
    let price = round_normal(price, config.price);
    if price <= Decimal::ZERO {
        return Err(PolymarketError::InvalidOrder("price must be positive".into()));
    }
    let maker = round_down(amount, config.size);

    let taker = match side {
        Side::Buy => maker.checked_div(price),
        Side::Sell => maker.checked_mul(price),
    }
    .map(|value| fit_amount(value, config.amount))
    .ok_or_else(|| out_of_range(amount))?;

    ensure_non_zero((to_token_units(maker)?, to_token_units(taker)?), amount)
}

/// Worst price needed to fill `amount` against the book.
///
/// BUY walks asks from the cheapest, summing notional (`size * price`); SELL
/// walks bids from the richest, summing shares. When depth runs out a FOK order
/// fails, any other order type takes the deepest level seen.
pub fn market_price(
    book: &OrderBook,
    side: Side,
    amount: Decimal,
    order_type: OrderType,
) -> Result<Decimal> {
    let mut levels = match side {
        Side::Buy => book.asks.clone(),
        Side::Sell => book.bids.clone(),
    };
    match side {
        Side::Buy => levels.sort_by(|a, b| a.price.cmp(&b.price)),
        Side::Sell => levels.sort_by(|a, b| b.price.cmp(&a.price)),
    }

    let Some(deepest) = levels.last().map(|level| level.price) else {
        return Err(PolymarketError::NoLiquidity(format!(
            "no {} liquidity for token {}",
            match side {
                Side::Buy => "ask",
                Side::Sell => "bid",
            },
            book.token_id
        )));
    };

    let mut filled = Decimal::ZERO;
    for level in &levels {
        filled += match side {
            Side::Buy => level.size * level.price,
            Side::Sell => level.size,
        };
        if filled >= amount {
            return Ok(level.price);
        }
    }

    if order_type == OrderType::Fok {
        return Err(PolymarketError::NoLiquidity(format!(
            "book depth {filled} cannot fill {amount} for token {}",
            book.token_id
        )));
    }
    Ok(deepest)
}

fn round_normal(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

fn round_down(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::ToZero)
}

fn round_up(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::AwayFromZero)
}

fn decimal_places(value: Decimal) -> u32 {
    value.normalize().scale()
}

/// Trims a notional to `dp` places, first rounding up at `dp + 4` so values
/// like `0.49999999` land on `0.5` rather than `0.4999`.
fn fit_amount(value: Decimal, dp: u32) -> Decimal {
    if decimal_places(value) <= dp {
        return value;
    }
    let value = round_up(value, dp + 4);
    if decimal_places(value) > dp {
        round_down(value, dp)
    } else {
        value
    }
}

fn to_token_units(value: Decimal) -> Result<u128> {
    value
        .checked_mul(Decimal::from(10u64.pow(TOKEN_DECIMALS)))
        .and_then(|scaled| round_normal(scaled, 0).to_u128())
        .ok_or_else(|| out_of_range(value))
}

fn out_of_range(value: Decimal) -> PolymarketError {
    PolymarketError::InvalidOrder(format!("amount {value} is out of range"))
}

/// Sizes below the lot rounding collapse to zero and must not be signed.
fn ensure_non_zero(amounts: (u128, u128), size: Decimal) -> Result<(u128, u128)> {
    if amounts.0 == 0 || amounts.1 == 0 {
        return Err(PolymarketError::InvalidOrder(format!(
            "size {size} rounds to an empty order"
        )));
    }
    Ok(amounts)
}

fn generate_salt() -> u64 {
    let now = Utc::now().timestamp() as f64;
    (now * rand::random::<f64>()).round() as u64
}
