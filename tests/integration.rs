//! Integration tests for course-advisor.

mod router;
