//! Default GPIO assignments for the door/window contacts.
//!
//! Single source of truth for the stock wiring (BCM numbering on the
//! Raspberry Pi header).  A settings file can replace the whole list with
//! `sensor.<Name> = <pin>` entries.
//!
//! Every contact is a reed switch to ground with the pull-up enabled:
//! HIGH = magnet away = door/window open.

/// Front door reed switch.
pub const FRONT_DOOR_GPIO: u32 = 4;
/// Deck door reed switch.
pub const DECK_DOOR_GPIO: u32 = 17;
/// Laundry door reed switch.
pub const LAUNDRY_DOOR_GPIO: u32 = 27;

/// Stock sensor table: (display name, GPIO).
pub const DEFAULT_SENSORS: [(&str, u32); 3] = [
    ("Front Door", FRONT_DOOR_GPIO),
    ("Deck Door", DECK_DOOR_GPIO),
    ("Laundry Door", LAUNDRY_DOOR_GPIO),
];

/// Highest BCM GPIO number on the 40-pin header.
pub const MAX_GPIO: u32 = 27;
