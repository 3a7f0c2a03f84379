//! Mock device implementations for testing and development.
//!
//! This module provides simulated devices that can be controlled
//! programmatically without requiring physical hardware. Each mock is created
//! together with a handle that plays the part of the outside world.

pub mod central;
pub mod peripheral;
pub mod radio;

// Re-export commonly used types
pub use central::{LinkCall, MockCentral, MockCentralHandle, MockLink};
pub use peripheral::{
    MOCK_GATT_TABLE, MOCK_PERIPHERAL_ADDRESS, MockPeripheral, MockPeripheralHandle,
};
pub use radio::{MockRadio, MockRadioHandle};
