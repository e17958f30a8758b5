//! Deep links for sending birthday wishes.

use serde::Serialize;

use crate::birthday::BirthdayRecord;

pub fn default_message(name: &str) -> String {
  format!(
    "🎉 Happy Birthday {name}! 🎂\n\nWishing you a wonderful day filled with joy and happiness! 🎈"
  )
}

pub fn email_subject(name: &str) -> String { format!("🎉 Happy Birthday {name}!") }

fn with_video(message: &str, video_url: Option<&str>) -> String {
  match video_url.filter(|u| !u.is_empty()) {
    Some(url) => {
      format!("{message}\n\n🎬 Watch this special birthday animation for you:\n{url}")
    }
    None => message.to_owned(),
  }
}

/// `https://wa.me/<digits>?text=<message>`
pub fn whatsapp_link(phone: &str, message: &str, video_url: Option<&str>) -> String {
  let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
  let text = with_video(message, video_url);
  format!("https://wa.me/{digits}?text={}", urlencoding::encode(&text))
}

/// Gmail compose URL with recipient, subject and body filled in.
pub fn gmail_link(email: &str, name: &str, message: &str, video_url: Option<&str>) -> String {
  let body = with_video(message, video_url);
  format!(
    "https://mail.google.com/mail/?view=cm&fs=1&to={}&su={}&body={}",
    urlencoding::encode(email),
    urlencoding::encode(&email_subject(name)),
    urlencoding::encode(&body),
  )
}

/// A suggested animation to attach to a wish.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BirthdayVideo {
  pub name:        &'static str,
  pub url:         &'static str,
  pub description: &'static str,
}

pub const BIRTHDAY_VIDEOS: &[BirthdayVideo] = &[
  BirthdayVideo {
    name:        "Animated Birthday Cake",
    url:         "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
    description: "🎂 Beautiful animated birthday cake",
  },
  BirthdayVideo {
    name:        "Birthday Balloons Animation",
    url:         "https://giphy.com/gifs/birthday-happy-birthday-balloons-xT9IgG50Fb7Mi0prB6",
    description: "🎈 Colorful birthday balloons",
  },
  BirthdayVideo {
    name:        "Birthday Celebration Video",
    url:         "https://www.youtube.com/watch?v=jNQXAC9IVRw",
    description: "🎉 Celebration animation",
  },
];

/// Everything the in-app "send wishes" popup shows for one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContactPopup {
  pub birthday_id: String,
  pub name:        String,
  pub message:     String,
  pub whatsapp:    Option<String>,
  pub gmail:       Option<String>,
}

impl ContactPopup {
  pub fn for_record(record: &BirthdayRecord, video_url: Option<&str>) -> Self {
    let message = default_message(&record.name);
    Self {
      birthday_id: record.id.clone(),
      name: record.name.clone(),
      whatsapp: record
        .phone_number
        .as_deref()
        .map(|p| whatsapp_link(p, &message, video_url)),
      gmail: record
        .email
        .as_deref()
        .map(|e| gmail_link(e, &record.name, &message, video_url)),
      message,
    }
  }

  /// Build the popup using a phone number or email the user typed in when
  /// the record has none.
  pub fn with_manual_contact(
    record: &BirthdayRecord,
    phone: Option<&str>,
    email: Option<&str>,
    video_url: Option<&str>,
  ) -> Self {
    let mut filled = record.clone();
    if filled.phone_number.is_none() {
      filled.phone_number = phone.map(str::to_owned).filter(|p| !p.trim().is_empty());
    }
    if filled.email.is_none() {
      filled.email = email.map(str::to_owned).filter(|e| !e.trim().is_empty());
    }
    Self::for_record(&filled, video_url)
  }

  pub fn has_links(&self) -> bool { self.whatsapp.is_some() || self.gmail.is_some() }
}
