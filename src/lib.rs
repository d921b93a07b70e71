//! An LC-3 virtual machine.
//!
//! This crate executes assembled LC-3 program images:
//! a big-endian origin address followed by big-endian instruction words.
//!
//! # Usage
//!
//! An image is parsed with [`image::ImageFile`] and loaded into a [`sim::Simulator`]:
//! ```
//! use lc3_vm::image::ImageFile;
//! use lc3_vm::sim::Simulator;
//! use lc3_vm::sim::device::BufferedDisplay;
//! use lc3_vm::ast::reg_consts::R0;
//!
//! // .orig x3000
//! // ADD R0, R0, #5
//! // HALT
//! let bytes = [0x30, 0x00, 0x10, 0x25, 0xF0, 0x25];
//! let image = ImageFile::parse(&bytes).unwrap();
//!
//! let mut sim = Simulator::new(Default::default());
//! let output = BufferedDisplay::default();
//! sim.device_handler.set_display(output.clone());
//! sim.load_image(&image);
//! sim.run().unwrap();
//!
//! assert!(sim.hit_halt());
//! assert_eq!(sim.reg_file[R0], 5);
//! assert_eq!(&**output.get_buffer().read().unwrap(), b"HALT\n");
//! ```
//!
//! For more granular control (stepping, breakpoints, devices), see the [`sim`] module.
#![warn(missing_docs)]

pub mod ast;
pub mod image;
pub mod sim;
pub mod term;
