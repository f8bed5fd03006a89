// THEORY:
// This file is the main entry point for the `darkspot_vision` library crate.
// It defines the public API used by the `darkspot_viewer` binary.
//
// The crate is split along the data flow of a single frame:
// - `device` opens a camera and proves that it delivers frames.
// - `pipeline` (backed by `core_modules`) turns one color frame into an annotated
//   frame, a binary mask and a list of dark regions.
// - `display` and `capture_loop` put the result on screen and react to the
//   keyboard.
//
// Nothing here keeps state between frames except the capture loop's view mode
// and save counter.

pub mod capture_loop;
pub mod core_modules;
pub mod device;
pub mod display;
pub mod pipeline;
