// lockscan — option engine and lock-ordering deadlock detector
//
// Author : kelexine (https://github.com/kelexine)
// Version: Dynamic (Cargo.toml)
// License: MIT
//
// Two independent building blocks for target-debugging tools:
//   • args     — declarative flag parsing with required, dependent and
//                implied arguments, typed single/multi-value options
//   • deadlock — wait-for-graph cycle detection over mutex owner/waiter
//                records collected from a live or captured target

pub mod args;
pub mod deadlock;
