pub(crate) mod absence_workflow;
pub(crate) mod attachments;
pub(crate) mod attendance_summary;
