pub mod data_set_record;
pub mod decimal;
pub mod order_book_event;
pub mod symbol;
pub mod trade;
pub mod trade_run;
