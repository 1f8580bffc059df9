use depthset_domain::entities::order_book::OrderBookState;
use depthset_domain::services::data_set_calculator::{DataSetCalculator, StartStatsPolicy};
use depthset_domain::services::order_book_stats::OrderBookAggregator;
use depthset_domain::value_objects::decimal::Decimal;
use depthset_domain::value_objects::order_book_event::{BookLevel, OrderBookAction, OrderBookEvent};
use depthset_domain::value_objects::symbol::SymbolId;
use depthset_domain::value_objects::trade::Trade;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BenchMode {
    /// Full `DataSetCalculator::calculate` over the synthetic span.
    Calculate,
    /// Book replay plus per-event side statistics, no trade windows.
    Book,
}

impl BenchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            BenchMode::Calculate => "calculate",
            BenchMode::Book => "book",
        }
    }
}

pub struct BenchSummary {
    pub mode: BenchMode,
    pub updates_requested: usize,
    pub trades_requested: usize,
    pub events_processed: u64,
    pub records: usize,
    pub elapsed_ms: u64,
    pub events_per_sec: f64,
}

/// Synthetic book depth on each side of the snapshot.
const SNAPSHOT_DEPTH: i64 = 200;
const START_TS_MS: i64 = 1_700_000_000_000;
const EVENT_STEP_MS: i64 = 100;
const MID_TICKS: i64 = 500_000;

pub fn run_bench(updates: usize, trades: usize, mode: &str) -> Result<BenchSummary, String> {
    if updates == 0 {
        return Err("updates must be > 0".to_string());
    }

    let bench_mode = match mode.trim().to_lowercase().as_str() {
        "calculate" => BenchMode::Calculate,
        "book" => BenchMode::Book,
        _ => return Err("unsupported mode (use: calculate | book)".to_string()),
    };

    let grid = Grid {
        tick: Decimal::parse("0.1").map_err(|err| format!("invalid tick size: {err}"))?,
        lot: Decimal::parse("0.001").map_err(|err| format!("invalid lot size: {err}"))?,
    };
    let events = synthetic_events(updates, grid)?;
    let trade_list = synthetic_trades(trades, updates, grid)?;

    let start = Instant::now();
    let (events_processed, records) = match bench_mode {
        BenchMode::Calculate => {
            let calculator = DataSetCalculator::new(StartStatsPolicy::FirstNonEmpty);
            let records = calculator
                .calculate(SymbolId::BtcUsdt, 0, &events, &trade_list)
                .map_err(|err| format!("bench calculation failed: {err}"))?;
            (events.len() as u64, records.len())
        }
        BenchMode::Book => {
            let mut book = OrderBookState::new();
            let mut processed = 0u64;
            for event in &events {
                let applied = if event.is_snapshot() {
                    book.initialize_from_snapshot(event)
                } else {
                    book.apply_update(event)
                };
                applied.map_err(|err| format!("bench replay failed: {err}"))?;
                OrderBookAggregator::summarize(book.asks())
                    .and_then(|_| OrderBookAggregator::summarize(book.bids()))
                    .map_err(|err| format!("bench side stats failed: {err}"))?;
                processed += 1;
            }
            (processed, 0)
        }
    };

    let elapsed = start.elapsed();
    let events_per_sec = if elapsed.as_secs_f64() > 0.0 {
        events_processed as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };

    Ok(BenchSummary {
        mode: bench_mode,
        updates_requested: updates,
        trades_requested: trades,
        events_processed,
        records,
        elapsed_ms: elapsed.as_millis() as u64,
        events_per_sec,
    })
}

/// Price and size increments of the synthetic instrument.
#[derive(Clone, Copy)]
struct Grid {
    tick: Decimal,
    lot: Decimal,
}

impl Grid {
    fn price(&self, ticks: i64) -> Result<Decimal, String> {
        Decimal::from(ticks)
            .checked_mul(self.tick)
            .map_err(|err| format!("synthetic price out of range: {err}"))
    }

    fn size(&self, lots: i64) -> Result<Decimal, String> {
        Decimal::from(lots)
            .checked_mul(self.lot)
            .map_err(|err| format!("synthetic size out of range: {err}"))
    }

    fn level(&self, ticks: i64, lots: i64) -> Result<BookLevel, String> {
        Ok(BookLevel::new(self.price(ticks)?, self.size(lots)?))
    }
}

fn synthetic_events(updates: usize, grid: Grid) -> Result<Vec<OrderBookEvent>, String> {

    let mut events = Vec::with_capacity(updates + 1);
    events.push(OrderBookEvent {
        symbol_id: SymbolId::BtcUsdt,
        timestamp_ms: START_TS_MS,
        action: OrderBookAction::Snapshot,
        asks: (1..=SNAPSHOT_DEPTH)
            .map(|i| grid.level(MID_TICKS + i, 1_000 + i * 7))
            .collect::<Result<_, _>>()?,
        bids: (1..=SNAPSHOT_DEPTH)
            .map(|i| grid.level(MID_TICKS - i, 1_000 + i * 5))
            .collect::<Result<_, _>>()?,
    });

    for i in 0..updates as i64 {
        let offset = 1 + (i * 37) % SNAPSHOT_DEPTH;
        // Every fourth update removes the level instead of resizing it.
        let qty = if i % 4 == 0 { 0 } else { 500 + (i * 13) % 2_000 };
        events.push(OrderBookEvent {
            symbol_id: SymbolId::BtcUsdt,
            timestamp_ms: START_TS_MS + (i + 1) * EVENT_STEP_MS,
            action: OrderBookAction::Update,
            asks: vec![grid.level(MID_TICKS + offset, qty)?],
            bids: vec![grid.level(MID_TICKS - offset, qty / 2)?],
        });
    }
    Ok(events)
}

fn synthetic_trades(count: usize, updates: usize, grid: Grid) -> Result<Vec<Trade>, String> {
    if count == 0 {
        return Ok(Vec::new());
    }
    let span_ms = (updates as i64) * EVENT_STEP_MS;
    (0..count as i64)
        .map(|i| {
            let drift = ((i as f64) * 0.01).sin() * 50.0;
            Ok(Trade {
                symbol_id: SymbolId::BtcUsdt,
                timestamp_ms: START_TS_MS + i * span_ms / count as i64,
                trade_id: i + 1,
                price: grid.price(MID_TICKS + drift as i64)?,
                quantity: grid.size(1 + i % 25)?,
                is_buy: i % 3 != 0,
            })
        })
        .collect()
}
