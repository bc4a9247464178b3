//! Fatal driver fault handling
//!
//! Some libusb failures leave the vendor driver with dead transfer state
//! that no in-process retry can recover; the only safe response is to exit
//! and let the process supervisor restart the bridge from scratch.

/// Error substrings that indicate an unrecoverable USB fault
const FATAL_PATTERNS: [&str; 2] = ["LIBUSB_ERROR_NO_DEVICE", "LIBUSB_TRANSFER_ERROR"];

/// Whether a driver error message describes an unrecoverable fault
pub fn is_fatal_driver_error(message: &str) -> bool {
    FATAL_PATTERNS.iter().any(|p| message.contains(p))
}

/// Log the reason and terminate the process immediately
///
/// Uses an abort rather than a graceful shutdown: after a fatal USB fault
/// the driver's transfer callbacks can no longer be trusted to unwind.
pub fn terminate(reason: &str) -> ! {
    tracing::error!(reason, "Unrecoverable driver fault, exiting for supervisor restart");
    std::process::abort()
}
