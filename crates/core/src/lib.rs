#![deny(warnings)]

pub mod config;
pub mod decode;
pub mod emotion;
pub mod features;
pub mod prosody;
pub mod resample;
pub mod tts;
