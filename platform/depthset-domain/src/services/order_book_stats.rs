use crate::entities::order_book::PriceLevels;
use crate::errors::ValidationError;
use crate::value_objects::data_set_record::BookSideStatistics;

pub struct OrderBookAggregator;

impl OrderBookAggregator {
    /// Totals and extrema of one side. Volume of a level is `price * quantity`.
    ///
    /// Fails when a level volume or a running total does not fit a [`Decimal`] exactly.
    ///
    /// [`Decimal`]: crate::value_objects::decimal::Decimal
    pub fn summarize(levels: &PriceLevels) -> Result<BookSideStatistics, ValidationError> {
        let mut iter = levels.iter();
        let Some((&first_price, &first_quantity)) = iter.next() else {
            return Ok(BookSideStatistics::default());
        };

        let first_volume = first_price.checked_mul(first_quantity)?;
        let mut stats = BookSideStatistics {
            total_quantity: first_quantity,
            total_volume: first_volume,
            max_price: first_price,
            min_price: first_price,
            max_quantity: first_quantity,
            min_quantity: first_quantity,
            max_volume: first_volume,
            min_volume: first_volume,
        };

        for (&price, &quantity) in iter {
            let volume = price.checked_mul(quantity)?;
            stats.total_quantity = stats.total_quantity.checked_add(quantity)?;
            stats.total_volume = stats.total_volume.checked_add(volume)?;
            stats.max_price = stats.max_price.max(price);
            stats.min_price = stats.min_price.min(price);
            stats.max_quantity = stats.max_quantity.max(quantity);
            stats.min_quantity = stats.min_quantity.min(quantity);
            stats.max_volume = stats.max_volume.max(volume);
            stats.min_volume = stats.min_volume.min(volume);
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::decimal::Decimal;

    fn d(raw: &str) -> Decimal {
        Decimal::parse(raw).unwrap()
    }

    #[test]
    fn empty_side_is_all_zero() {
        let stats = OrderBookAggregator::summarize(&PriceLevels::new()).unwrap();
        assert_eq!(stats, BookSideStatistics::default());
        assert!(stats.is_empty());
    }

    #[test]
    fn totals_and_extrema_cover_every_level() {
        let mut levels = PriceLevels::new();
        levels.insert(d("100"), d("2"));
        levels.insert(d("101.5"), d("0.5"));
        levels.insert(d("99"), d("3"));

        let stats = OrderBookAggregator::summarize(&levels).unwrap();
        assert_eq!(stats.total_quantity, d("5.5"));
        assert_eq!(stats.total_volume, d("547.75"));
        assert_eq!(stats.max_price, d("101.5"));
        assert_eq!(stats.min_price, d("99"));
        assert_eq!(stats.max_quantity, d("3"));
        assert_eq!(stats.min_quantity, d("0.5"));
        assert_eq!(stats.max_volume, d("297"));
        assert_eq!(stats.min_volume, d("50.75"));
    }

    #[test]
    fn oversized_level_fails_instead_of_panicking() {
        let mut levels = PriceLevels::new();
        levels.insert(d("10000000000000000"), d("10000000000000"));
        assert_eq!(
            OrderBookAggregator::summarize(&levels),
            Err(ValidationError::ArithmeticOverflow("mul"))
        );

        let mut levels = PriceLevels::new();
        levels.insert(d("0.000000000000001"), d("0.0000000000000015"));
        assert_eq!(
            OrderBookAggregator::summarize(&levels),
            Err(ValidationError::PrecisionLoss("mul"))
        );
    }
}
