//! Board drivers, hardware initialisation, and peripheral helpers.

pub mod gpio_isr;
pub mod hw_init;
pub mod status_led;
pub mod task_pin;
