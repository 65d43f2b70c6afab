pub mod emailjs;
pub mod log;

use async_trait::async_trait;

use crate::errors::NotificationError;
use crate::models::Booking;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    BookingReceived,
    NewBooking,
    BookingConfirmed,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::BookingReceived => "booking_received",
            NotificationKind::NewBooking => "new_booking",
            NotificationKind::BookingConfirmed => "booking_confirmed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub to_name: String,
    pub to_email: String,
    pub reply_to: Option<String>,
    pub subject: String,
    pub message: String,
}

impl Notification {
    /// Sent to the client right after a booking is stored.
    pub fn booking_received(booking: &Booking) -> Self {
        Self {
            kind: NotificationKind::BookingReceived,
            to_name: booking.client_name.clone(),
            to_email: booking.client_email.clone(),
            reply_to: None,
            subject: format!("Booking Received - {}", booking.service_name),
            message: format!(
                "Your booking for {} on {} at {} has been received. We'll confirm shortly!",
                booking.service_name,
                booking.booking_date.format("%Y-%m-%d"),
                booking.preferred_time
            ),
        }
    }

    /// Sent to the operator inbox for every new booking.
    pub fn new_booking(booking: &Booking, operator_email: &str) -> Self {
        let message = format!(
            "New service booking:\n\n\
             Service: {}\n\
             Date: {}\n\
             Time: {} ({})\n\
             Duration: {} minutes\n\
             Client: {}\n\
             Email: {}\n\
             Phone: {}\n\
             Company: {}\n\n\
             Message: {}",
            booking.service_name,
            booking.booking_date.format("%Y-%m-%d"),
            booking.preferred_time,
            booking.timezone,
            booking.duration,
            booking.client_name,
            booking.client_email,
            booking.client_phone.as_deref().unwrap_or("N/A"),
            booking.company.as_deref().unwrap_or("N/A"),
            booking.message.as_deref().unwrap_or("No message"),
        );

        Self {
            kind: NotificationKind::NewBooking,
            to_name: "Bookings".to_string(),
            to_email: operator_email.to_string(),
            reply_to: Some(booking.client_email.clone()),
            subject: format!(
                "New Booking: {} - {}",
                booking.service_name, booking.client_name
            ),
            message,
        }
    }

    pub fn booking_confirmed(booking: &Booking, meeting_link: Option<&str>) -> Self {
        let mut message = format!(
            "Your booking for {} on {} at {} has been confirmed!",
            booking.service_name,
            booking.booking_date.format("%Y-%m-%d"),
            booking.preferred_time
        );
        if let Some(link) = meeting_link.filter(|l| !l.is_empty()) {
            message.push_str(&format!("\n\nMeeting Link: {link}"));
        }

        Self {
            kind: NotificationKind::BookingConfirmed,
            to_name: booking.client_name.clone(),
            to_email: booking.client_email.clone(),
            reply_to: None,
            subject: format!("Booking Confirmed - {}", booking.service_name),
            message,
        }
    }

    pub fn template_params(&self) -> serde_json::Value {
        serde_json::json!({
            "email_type": self.kind.as_str(),
            "to_name": self.to_name,
            "to_email": self.to_email,
            "reply_to": self.reply_to,
            "subject": self.subject,
            "message": self.message,
        })
    }
}
