use depthset_domain::entities::order_book::OrderBookState;
use depthset_domain::services::data_set_calculator::DataSetCalculator;
use depthset_domain::services::order_book_stats::OrderBookAggregator;
use depthset_domain::value_objects::decimal::Decimal;
use depthset_domain::value_objects::order_book_event::{BookLevel, OrderBookAction, OrderBookEvent};
use depthset_domain::value_objects::symbol::SymbolId;
use depthset_domain::value_objects::trade::Trade;
use proptest::prelude::*;
use std::collections::BTreeMap;

fn decimal_text() -> impl Strategy<Value = String> {
    (any::<bool>(), 0u64..10_000_000, 0u32..100_000_000, 0usize..=8).prop_map(
        |(negative, int_part, frac_part, frac_digits)| {
            let sign = if negative { "-" } else { "" };
            if frac_digits == 0 {
                format!("{sign}{int_part}")
            } else {
                let frac = format!("{frac_part:08}");
                format!("{sign}{int_part}.{}", &frac[..frac_digits])
            }
        },
    )
}

fn levels(max_len: usize, min_qty: u32) -> impl Strategy<Value = Vec<(u32, u32)>> {
    prop::collection::vec((1u32..60, min_qty..6), 0..max_len)
}

fn to_levels(raw: &[(u32, u32)]) -> Vec<BookLevel> {
    raw.iter()
        .map(|(price, qty)| {
            BookLevel::new(
                Decimal::from(i64::from(*price)),
                Decimal::from(i64::from(*qty)),
            )
        })
        .collect()
}

fn event(ts: i64, action: OrderBookAction, asks: &[(u32, u32)], bids: &[(u32, u32)]) -> OrderBookEvent {
    OrderBookEvent {
        symbol_id: SymbolId::EthUsdt,
        timestamp_ms: ts,
        action,
        asks: to_levels(asks),
        bids: to_levels(bids),
    }
}

fn replay_reference(reference: &mut BTreeMap<u32, u32>, raw: &[(u32, u32)]) {
    for (price, qty) in raw {
        if *qty > 0 {
            reference.insert(*price, *qty);
        } else {
            reference.remove(price);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn decimal_text_round_trips(raw in decimal_text()) {
        let parsed = Decimal::parse(&raw).unwrap();
        let reparsed = Decimal::parse(&parsed.to_string()).unwrap();
        prop_assert_eq!(parsed, reparsed);
    }

    #[test]
    fn decimal_add_then_sub_is_identity(a in decimal_text(), b in decimal_text()) {
        let a = Decimal::parse(&a).unwrap();
        let b = Decimal::parse(&b).unwrap();
        let sum = a.checked_add(b).unwrap();
        prop_assert_eq!(sum.checked_sub(b).unwrap(), a);
        prop_assert_eq!(sum, b.checked_add(a).unwrap());
    }

    #[test]
    fn replayed_book_matches_reference_and_totals(
        snapshot in levels(20, 0),
        updates in prop::collection::vec(levels(8, 0), 0..12),
    ) {
        let mut book = OrderBookState::new();
        book.initialize_from_snapshot(&event(0, OrderBookAction::Snapshot, &snapshot, &snapshot)).unwrap();

        let mut reference = BTreeMap::new();
        replay_reference(&mut reference, &snapshot);

        for (idx, update) in updates.iter().enumerate() {
            book.apply_update(&event(idx as i64 + 1, OrderBookAction::Update, update, &[])).unwrap();
            replay_reference(&mut reference, update);
        }

        prop_assert!(book.asks().values().all(|qty| qty.is_positive()));
        prop_assert_eq!(book.asks().len(), reference.len());
        for (price, qty) in &reference {
            prop_assert_eq!(
                book.asks().get(&Decimal::from(i64::from(*price))),
                Some(&Decimal::from(i64::from(*qty)))
            );
        }

        let stats = OrderBookAggregator::summarize(book.asks()).unwrap();
        let expected_total = book
            .asks()
            .values()
            .try_fold(Decimal::ZERO, |acc, qty| acc.checked_add(*qty))
            .unwrap();
        prop_assert_eq!(stats.total_quantity, expected_total);
        prop_assert!(stats.min_price <= stats.max_price);
    }

    #[test]
    fn records_account_for_every_trade_inside_the_event_span(
        gaps in prop::collection::vec(0i64..50, 1..10),
        trade_offsets in prop::collection::vec(0i64..600, 0..40),
    ) {
        let mut events = vec![event(0, OrderBookAction::Snapshot, &[(10, 1)], &[(9, 1)])];
        let mut ts = 0;
        for gap in &gaps {
            ts += gap;
            events.push(event(ts, OrderBookAction::Update, &[], &[]));
        }
        let last_ts = ts;

        let mut offsets = trade_offsets.clone();
        offsets.sort_unstable();
        let trades: Vec<Trade> = offsets
            .iter()
            .enumerate()
            .map(|(idx, offset)| Trade {
                symbol_id: SymbolId::EthUsdt,
                timestamp_ms: *offset,
                trade_id: idx as i64 + 1,
                price: Decimal::from(10),
                quantity: Decimal::ONE,
                is_buy: idx % 3 == 0,
            })
            .collect();

        let records = DataSetCalculator::default()
            .calculate(SymbolId::EthUsdt, 0, &events, &trades)
            .unwrap();

        let counted: i64 = records.iter().map(|r| i64::from(r.total_trades_count)).sum();
        let expected = offsets.iter().filter(|ts| **ts < last_ts).count() as i64;
        prop_assert_eq!(counted, expected);

        for (idx, record) in records.iter().enumerate() {
            prop_assert_eq!(record.record_idx, idx as i32);
            prop_assert!(record.total_trades_count > 0);
            prop_assert!(record.buy_trades_count <= record.total_trades_count);
            prop_assert!(record.start_timestamp_ms < record.end_timestamp_ms);
        }
    }
}
