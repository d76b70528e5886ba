//! Logging macros that forward to `defmt` on target and to `log` on host.
#![macro_use]
#![allow(unused_macros, reason = "not every level is used by every feature set")]

macro_rules! trace {
    ($s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(log_defmt)]
            ::defmt::trace!($s $(, $x)*);
            #[cfg(all(feature = "log", not(log_defmt)))]
            ::log::trace!($s $(, $x)*);
            #[cfg(not(any(log_defmt, feature = "log")))]
            let _ = ($( & $x ),*);
        }
    };
}

macro_rules! debug {
    ($s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(log_defmt)]
            ::defmt::debug!($s $(, $x)*);
            #[cfg(all(feature = "log", not(log_defmt)))]
            ::log::debug!($s $(, $x)*);
            #[cfg(not(any(log_defmt, feature = "log")))]
            let _ = ($( & $x ),*);
        }
    };
}

macro_rules! info {
    ($s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(log_defmt)]
            ::defmt::info!($s $(, $x)*);
            #[cfg(all(feature = "log", not(log_defmt)))]
            ::log::info!($s $(, $x)*);
            #[cfg(not(any(log_defmt, feature = "log")))]
            let _ = ($( & $x ),*);
        }
    };
}

macro_rules! warn {
    ($s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(log_defmt)]
            ::defmt::warn!($s $(, $x)*);
            #[cfg(all(feature = "log", not(log_defmt)))]
            ::log::warn!($s $(, $x)*);
            #[cfg(not(any(log_defmt, feature = "log")))]
            let _ = ($( & $x ),*);
        }
    };
}

macro_rules! error {
    ($s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(log_defmt)]
            ::defmt::error!($s $(, $x)*);
            #[cfg(all(feature = "log", not(log_defmt)))]
            ::log::error!($s $(, $x)*);
            #[cfg(not(any(log_defmt, feature = "log")))]
            let _ = ($( & $x ),*);
        }
    };
}
