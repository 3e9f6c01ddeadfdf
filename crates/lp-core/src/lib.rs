//! # lp-core
//!
//! Domain models, request splitting, status workflow and persistence for the
//! lab request portal.
//!
//! Researchers submit Normal Test Requests (NTR), Analysis Solution Requests
//! (ASR) and Equipment Reservations (ER). An NTR is split into one request
//! per capability; every request gets a number drawn from its capability's
//! run counter. Samples move through a status workflow that rolls up into
//! their request.

pub mod db;
pub mod models;
pub mod submission;
pub mod workflow;

pub use models::{
    Capability, Equipment, EquipmentStatus, Io, Location, Priority, Request, RequestStatus,
    RequestType, RequestWithSamples, Role, SampleStatus, TestMethod, TestingSample, User,
};
pub use submission::{
    AsrSubmission, ErSubmission, NtrLine, NtrSubmission, SampleDraft, SubmissionError,
};
pub use workflow::WorkflowError;
