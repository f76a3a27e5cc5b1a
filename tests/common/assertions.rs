//! Custom assertion macros
//!
//! Money values are `f64`, so price checks compare with a tolerance.

/// Assert that a result is ok and return the value
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($result:expr, $message:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("{}: {:?}", $message, e),
        }
    };
}

/// Assert that two amounts agree to the cent
#[macro_export]
macro_rules! assert_money_eq {
    ($left:expr, $right:expr) => {
        let (left, right): (f64, f64) = ($left, $right);
        assert!(
            (left - right).abs() < 0.005,
            "Amounts differ: {} vs {}",
            left,
            right
        );
    };
}
