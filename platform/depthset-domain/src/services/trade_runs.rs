use crate::errors::ValidationError;
use crate::value_objects::trade::Trade;
use crate::value_objects::trade_run::TradeRunRecord;

/// Groups consecutive same-direction trades into [`TradeRunRecord`]s.
pub struct TradeRunAggregator;

impl TradeRunAggregator {
    /// Continues from `last_run` (the newest persisted run, possibly still open) over `trades`
    /// sorted by trade id.
    ///
    /// Trades already covered by `last_run` are skipped. The returned runs are ordered by
    /// `start_trade_id`; the first one is the continued `last_run` when new trades extended it,
    /// and the last one is still open and must be upserted.
    pub fn aggregate(
        last_run: Option<&TradeRunRecord>,
        trades: &[Trade],
    ) -> Result<Vec<TradeRunRecord>, ValidationError> {
        let resume_after = last_run.map(|run| run.end_trade_id);
        let mut open = last_run.cloned();
        let mut open_touched = false;
        let mut runs = Vec::new();

        for trade in trades {
            if resume_after.is_some_and(|last_id| trade.trade_id <= last_id) {
                continue;
            }
            match open.as_mut() {
                Some(run) if run.accepts(trade) => {
                    run.push(trade)?;
                    open_touched = true;
                }
                _ => {
                    if let Some(closed) = open.take() {
                        if open_touched {
                            runs.push(closed);
                        }
                    }
                    open = Some(TradeRunRecord::open(trade)?);
                    open_touched = true;
                }
            }
        }

        if let Some(run) = open {
            if open_touched {
                runs.push(run);
            }
        }
        Ok(runs)
    }
}
