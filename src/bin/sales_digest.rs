use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    sales_digest::app::run_monthly_digest(std::env::args().skip(1))
}
