pub mod booking;

pub use booking::{
    Booking, BookingFilter, BookingPage, BookingPatch, BookingSort, BookingStatus,
    CreateBookingRequest, NewBooking, Pagination, UpdateBookingRequest,
};
