//! End-to-end deal lifecycle through the engine: happy path, timeouts,
//! custody conservation, and terminality.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dealdesk::domain::{AccountId, Asset, DealState, FiatAmount, MarketRate, Offer, Timestamp};
use dealdesk::engine::{AccruingCollector, DealEngine, EngineParams, NewOffer};
use dealdesk::error::EngineError;

const BTC_USD_MARKET: u64 = 50_000_000_000; // $50,000.00 per BTC in fiat micros

fn params() -> EngineParams {
    EngineParams {
        fee_bps: 100,
        accept_window_secs: 1_000,
        payment_window_secs: 2_000,
        assertion_liveness_secs: 600,
        assertion_bond_min: 1_000,
        stewards: HashSet::new(),
        assets: HashMap::from([("BTC".to_string(), 8u8)]),
        fiats: HashSet::from(["USD".to_string()]),
        methods: HashSet::from(["bank_transfer".to_string()]),
    }
}

fn setup() -> (DealEngine, Arc<AccruingCollector>) {
    let fees = Arc::new(AccruingCollector::new());
    (DealEngine::new(params(), fees.clone()), fees)
}

fn alice() -> AccountId {
    AccountId::new("alice")
}

fn bob() -> AccountId {
    AccountId::new("bob")
}

fn btc() -> Asset {
    Asset::new("BTC")
}

fn market() -> MarketRate {
    MarketRate::new(BTC_USD_MARKET)
}

fn usd(whole: u64) -> FiatAmount {
    FiatAmount::new(whole * 1_000_000)
}

/// Alice sells BTC at market with $10..$1000 limits.
fn sell_offer(engine: &DealEngine, margin_percent: i64) -> Offer {
    engine
        .create_offer(
            &alice(),
            NewOffer {
                is_sell: true,
                asset: "BTC".to_string(),
                fiat: "USD".to_string(),
                method: "bank_transfer".to_string(),
                margin_percent,
                min_fiat: usd(10),
                max_fiat: usd(1_000),
                terms: "SEPA only".to_string(),
            },
        )
        .unwrap()
}

#[test]
fn test_happy_path_released_with_fee() {
    let (engine, fees) = setup();
    let offer = sell_offer(&engine, 0);
    engine.deposit(&alice(), &btc(), 1_000_000).unwrap();
    engine.register_profile(&alice(), Timestamp::new(0));
    engine.register_profile(&bob(), Timestamp::new(0));

    // $100 at $50k/BTC and 1.0x margin is exactly 0.002 BTC.
    let outcome = engine
        .create_deal(
            &bob(),
            offer.id,
            usd(100),
            "IBAN DE00".to_string(),
            market(),
            Timestamp::new(0),
        )
        .unwrap();
    let deal_id = outcome.deal.id;
    assert_eq!(outcome.deal.state, DealState::Created);
    assert_eq!(outcome.deal.token_amount.as_base_units(), 200_000);
    assert_eq!(engine.custody_of(deal_id), 0);

    engine.accept(&alice(), deal_id, Timestamp::new(10)).unwrap();
    engine.fund(&alice(), deal_id, Timestamp::new(20)).unwrap();
    assert_eq!(engine.custody_of(deal_id), 200_000);
    assert_eq!(engine.balance_of(&alice(), &btc()), 800_000);

    engine.mark_paid(&bob(), deal_id, Timestamp::new(50)).unwrap();
    let outcome = engine.release(&alice(), deal_id, Timestamp::new(80)).unwrap();
    assert_eq!(outcome.deal.state, DealState::Released);

    // 1% fee on 200_000 units.
    assert_eq!(fees.collected(&btc()), 2_000);
    assert_eq!(engine.balance_of(&bob(), &btc()), 198_000);
    assert_eq!(engine.custody_of(deal_id), 0);

    // Settlement statistics landed on both profiles.
    let ap = engine.primary_profile(&alice()).unwrap();
    let bp = engine.primary_profile(&bob()).unwrap();
    assert_eq!(ap.deals_completed, 1);
    assert_eq!(bp.deals_completed, 1);
    assert_eq!(ap.volume, 100_000_000);
    assert_eq!(bp.avg_payment_time_secs(), Some(30)); // paid 50 - funded 20
    assert_eq!(ap.avg_release_time_secs(), Some(30)); // released 80 - paid 50
}

#[test]
fn test_margin_scales_escrow() {
    let (engine, _) = setup();
    let offer = sell_offer(&engine, 5);
    let outcome = engine
        .create_deal(
            &bob(),
            offer.id,
            usd(100),
            String::new(),
            market(),
            Timestamp::new(0),
        )
        .unwrap();
    // A 1.05x rate escrows 5% more asset for the same fiat.
    assert_eq!(outcome.deal.token_amount.as_base_units(), 210_000);
}

#[test]
fn test_unaccepted_deal_expires() {
    let (engine, _) = setup();
    let offer = sell_offer(&engine, 0);
    engine.register_profile(&alice(), Timestamp::new(0));

    let deal_id = engine
        .create_deal(
            &bob(),
            offer.id,
            usd(50),
            String::new(),
            market(),
            Timestamp::new(0),
        )
        .unwrap()
        .deal
        .id;

    // Before the accept deadline a stranger cannot touch it.
    let stranger = AccountId::new("stranger");
    assert!(matches!(
        engine.cancel(&stranger, deal_id, Timestamp::new(999)),
        Err(EngineError::InvalidState(_))
    ));

    let outcome = engine
        .cancel(&stranger, deal_id, Timestamp::new(1_000))
        .unwrap();
    assert_eq!(outcome.deal.state, DealState::Cancelled);
    // The owner let it lapse.
    assert_eq!(engine.primary_profile(&alice()).unwrap().deals_expired, 1);
}

#[test]
fn test_concurrent_timeout_cancels_pick_one_winner() {
    let (engine, _) = setup();
    let offer = sell_offer(&engine, 0);
    let deal_id = engine
        .create_deal(
            &bob(),
            offer.id,
            usd(50),
            String::new(),
            market(),
            Timestamp::new(0),
        )
        .unwrap()
        .deal
        .id;

    // Several watchers race the same expired deal; the guard re-evaluates
    // under the deal lock, so exactly one cancel lands.
    let engine = Arc::new(engine);
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = engine.clone();
            std::thread::spawn(move || {
                engine.cancel(
                    &AccountId::new(format!("watcher-{i}")),
                    deal_id,
                    Timestamp::new(1_000),
                )
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for lost in results.iter().filter(|r| r.is_err()) {
        assert!(matches!(lost, Err(EngineError::InvalidState(_))));
    }
    assert_eq!(engine.deal(deal_id).unwrap().state, DealState::Cancelled);
}

#[test]
fn test_buy_offer_expiry_charges_the_owner() {
    let (engine, _) = setup();
    // Alice wants to BUY, so bob (the taker) is the seller. The deal dies
    // waiting for alice to accept; the expiry is hers, not the seller's.
    let offer = engine
        .create_offer(
            &alice(),
            NewOffer {
                is_sell: false,
                asset: "BTC".to_string(),
                fiat: "USD".to_string(),
                method: "bank_transfer".to_string(),
                margin_percent: 0,
                min_fiat: usd(10),
                max_fiat: usd(1_000),
                terms: String::new(),
            },
        )
        .unwrap();
    engine.register_profile(&alice(), Timestamp::new(0));
    engine.register_profile(&bob(), Timestamp::new(0));

    let deal_id = engine
        .create_deal(
            &bob(),
            offer.id,
            usd(100),
            String::new(),
            market(),
            Timestamp::new(0),
        )
        .unwrap()
        .deal
        .id;
    engine
        .cancel(&AccountId::new("watcher"), deal_id, Timestamp::new(1_000))
        .unwrap();

    assert_eq!(engine.primary_profile(&alice()).unwrap().deals_expired, 1);
    assert_eq!(engine.primary_profile(&bob()).unwrap().deals_expired, 0);
}

#[test]
fn test_funded_cancel_refunds_seller() {
    let (engine, _) = setup();
    let offer = sell_offer(&engine, 0);
    engine.deposit(&alice(), &btc(), 1_000_000).unwrap();

    let deal_id = engine
        .create_deal(
            &bob(),
            offer.id,
            usd(100),
            String::new(),
            market(),
            Timestamp::new(0),
        )
        .unwrap()
        .deal
        .id;
    engine.accept(&alice(), deal_id, Timestamp::new(1)).unwrap();
    engine.fund(&alice(), deal_id, Timestamp::new(2)).unwrap();
    assert_eq!(engine.balance_of(&alice(), &btc()), 800_000);

    // The buyer walks away; custody returns in full, no fee.
    engine.cancel(&bob(), deal_id, Timestamp::new(3)).unwrap();
    assert_eq!(engine.balance_of(&alice(), &btc()), 1_000_000);
    assert_eq!(engine.custody_of(deal_id), 0);
}

#[test]
fn test_fund_requires_balance() {
    let (engine, _) = setup();
    let offer = sell_offer(&engine, 0);
    engine.deposit(&alice(), &btc(), 100).unwrap();

    let deal_id = engine
        .create_deal(
            &bob(),
            offer.id,
            usd(100),
            String::new(),
            market(),
            Timestamp::new(0),
        )
        .unwrap()
        .deal
        .id;
    engine.accept(&alice(), deal_id, Timestamp::new(1)).unwrap();

    let err = engine.fund(&alice(), deal_id, Timestamp::new(2)).unwrap_err();
    assert!(matches!(
        err,
        EngineError::InsufficientFunds {
            required: 200_000,
            available: 100
        }
    ));
    // The deal is untouched and fundable once the balance arrives.
    assert_eq!(engine.deal(deal_id).unwrap().state, DealState::Accepted);
    engine.deposit(&alice(), &btc(), 1_000_000).unwrap();
    engine.fund(&alice(), deal_id, Timestamp::new(3)).unwrap();
}

#[test]
fn test_terminal_deal_rejects_further_transitions() {
    let (engine, _) = setup();
    let offer = sell_offer(&engine, 0);

    let deal_id = engine
        .create_deal(
            &bob(),
            offer.id,
            usd(50),
            String::new(),
            market(),
            Timestamp::new(0),
        )
        .unwrap()
        .deal
        .id;
    engine.cancel(&bob(), deal_id, Timestamp::new(1)).unwrap();

    // Exactly one cancel wins; repeats observe the terminal state.
    assert!(matches!(
        engine.cancel(&bob(), deal_id, Timestamp::new(2)),
        Err(EngineError::InvalidState(_))
    ));
    assert!(matches!(
        engine.accept(&alice(), deal_id, Timestamp::new(2)),
        Err(EngineError::InvalidState(_))
    ));
}

#[test]
fn test_deal_snapshot_survives_offer_edits() {
    let (engine, _) = setup();
    let offer = sell_offer(&engine, 0);

    let deal = engine
        .create_deal(
            &bob(),
            offer.id,
            usd(100),
            String::new(),
            market(),
            Timestamp::new(0),
        )
        .unwrap()
        .deal;

    // Raising the margin afterwards must not touch the open deal.
    engine.set_offer_rate(&alice(), offer.id, 50).unwrap();
    let reread = engine.deal(deal.id).unwrap();
    assert_eq!(reread.rate, deal.rate);
    assert_eq!(reread.token_amount, deal.token_amount);
}

#[test]
fn test_owner_cannot_take_own_offer() {
    let (engine, _) = setup();
    let offer = sell_offer(&engine, 0);
    assert!(matches!(
        engine.create_deal(
            &alice(),
            offer.id,
            usd(100),
            String::new(),
            market(),
            Timestamp::new(0)
        ),
        Err(EngineError::InvalidInput(_))
    ));
}

#[test]
fn test_disabled_offer_rejects_deals() {
    let (engine, _) = setup();
    let offer = sell_offer(&engine, 0);
    engine.set_offer_disabled(&alice(), offer.id, true).unwrap();
    assert!(matches!(
        engine.create_deal(
            &bob(),
            offer.id,
            usd(100),
            String::new(),
            market(),
            Timestamp::new(0)
        ),
        Err(EngineError::InvalidState(_))
    ));
}

#[test]
fn test_messages_only_for_parties_and_open_deals() {
    let (engine, _) = setup();
    let offer = sell_offer(&engine, 0);
    let deal_id = engine
        .create_deal(
            &bob(),
            offer.id,
            usd(50),
            String::new(),
            market(),
            Timestamp::new(0),
        )
        .unwrap()
        .deal
        .id;

    engine
        .message(&bob(), deal_id, "paying tonight".to_string(), Timestamp::new(5))
        .unwrap();
    assert!(matches!(
        engine.message(
            &AccountId::new("stranger"),
            deal_id,
            "hi".to_string(),
            Timestamp::new(6)
        ),
        Err(EngineError::Unauthorized(_))
    ));

    engine.cancel(&bob(), deal_id, Timestamp::new(7)).unwrap();
    assert!(matches!(
        engine.message(&bob(), deal_id, "too late".to_string(), Timestamp::new(8)),
        Err(EngineError::InvalidState(_))
    ));
}

#[test]
fn test_buy_offer_swaps_roles() {
    let (engine, _) = setup();
    // Alice wants to BUY BTC: the taker is the seller and must fund.
    let offer = engine
        .create_offer(
            &alice(),
            NewOffer {
                is_sell: false,
                asset: "BTC".to_string(),
                fiat: "USD".to_string(),
                method: "bank_transfer".to_string(),
                margin_percent: 0,
                min_fiat: usd(10),
                max_fiat: usd(1_000),
                terms: String::new(),
            },
        )
        .unwrap();
    engine.deposit(&bob(), &btc(), 1_000_000).unwrap();

    let deal_id = engine
        .create_deal(
            &bob(),
            offer.id,
            usd(100),
            String::new(),
            market(),
            Timestamp::new(0),
        )
        .unwrap()
        .deal
        .id;
    engine.accept(&alice(), deal_id, Timestamp::new(1)).unwrap();

    // Alice is the buyer here; she cannot fund.
    assert!(matches!(
        engine.fund(&alice(), deal_id, Timestamp::new(2)),
        Err(EngineError::Unauthorized(_))
    ));
    engine.fund(&bob(), deal_id, Timestamp::new(2)).unwrap();
    engine.mark_paid(&alice(), deal_id, Timestamp::new(3)).unwrap();
    engine.release(&bob(), deal_id, Timestamp::new(4)).unwrap();
    assert_eq!(engine.balance_of(&alice(), &btc()), 198_000);
}
