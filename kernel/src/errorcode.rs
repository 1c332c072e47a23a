// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! Standard error enum for transport and RTOS operations.

/// Standard errors.
///
/// Only failure cases are represented; success is the `Ok` arm of the
/// `Result` an operation returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(usize)]
pub enum ErrorCode {
    /// Generic failure condition
    FAIL = 0,
    /// Underlying system is busy; retry
    BUSY = 1,
    /// Wait aborted by another party before it completed
    CANCEL = 2,
    /// No RTOS object available to satisfy a create request
    NOMEM = 3,
    /// Device does not exist
    NODEVICE = 4,
    /// An invalid parameter was passed
    INVAL = 5,
    /// A bounded wait expired
    TIMEOUT = 6,
}

impl From<ErrorCode> for usize {
    fn from(err: ErrorCode) -> usize {
        err as usize
    }
}

impl TryFrom<usize> for ErrorCode {
    type Error = ();

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ErrorCode::FAIL),
            1 => Ok(ErrorCode::BUSY),
            2 => Ok(ErrorCode::CANCEL),
            3 => Ok(ErrorCode::NOMEM),
            4 => Ok(ErrorCode::NODEVICE),
            5 => Ok(ErrorCode::INVAL),
            6 => Ok(ErrorCode::TIMEOUT),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ErrorCode;

    #[test]
    fn numeric_values_are_stable() {
        assert_eq!(usize::from(ErrorCode::FAIL), 0);
        assert_eq!(usize::from(ErrorCode::TIMEOUT), 6);
        assert_eq!(ErrorCode::try_from(2), Ok(ErrorCode::CANCEL));
        assert_eq!(ErrorCode::try_from(7), Err(()));
    }
}
