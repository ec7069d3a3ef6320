// Library root
// -----------
// This crate exposes a small library surface for the CLI. The binary
// (`main.rs`) wires these modules into the one-shot order pipeline.
//
// Module responsibilities:
// - `args`: command-line flags and their conversion into a run
//   configuration.
// - `api`: endpoint resolution, the version table, the HTTP client and the
//   login/token handshake that produces a `Session`.
// - `order`: order descriptors, creation/qualification and the multipart
//   scan upload.
// - `archive`: in-memory zip bundling of the files to upload.
// - `status`: status polling until the design reaches a terminal state.
// - `review`: accept/reject handling and the result download.
// - `workflow`: the top-to-bottom pipeline tying the above together.
pub mod api;
pub mod archive;
pub mod args;
pub mod order;
pub mod review;
pub mod status;
pub mod workflow;
