// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Board support, picked by target.
//!
//! Each board module provides the same items: `BoardUart`, `Led`, `init`,
//! `enable_rx`, `led_init`, `reset`, `poweroff`, `idle` and `input_closed`.

cfg_if::cfg_if! {
    if #[cfg(target_os = "none")] {
        mod arm_m;
        pub use arm_m::*;
    } else {
        mod hosted;
        pub use hosted::*;
    }
}
