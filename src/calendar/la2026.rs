//! 2026 City of Los Angeles posted sweep weeks and enforcement holidays.
//!
//! Source: StreetsLA "Sweeping2026" calendar. Each month has four posted
//! weeks starting on the first full Monday-Friday row; partial weeks at
//! month edges are not posted.

pub const YEAR: i32 = 2026;

/// (year, month, day, week) for every anchor Monday.
pub const ANCHORS: [(i32, u32, u32, u8); 48] = [
    // January
    (2026, 1, 5, 1),
    (2026, 1, 12, 2),
    (2026, 1, 19, 3),
    (2026, 1, 26, 4),
    // February
    (2026, 2, 2, 1),
    (2026, 2, 9, 2),
    (2026, 2, 16, 3),
    (2026, 2, 23, 4),
    // March
    (2026, 3, 2, 1),
    (2026, 3, 9, 2),
    (2026, 3, 16, 3),
    (2026, 3, 23, 4),
    // April
    (2026, 4, 6, 1),
    (2026, 4, 13, 2),
    (2026, 4, 20, 3),
    (2026, 4, 27, 4),
    // May
    (2026, 5, 4, 1),
    (2026, 5, 11, 2),
    (2026, 5, 18, 3),
    (2026, 5, 25, 4),
    // June
    (2026, 6, 1, 1),
    (2026, 6, 8, 2),
    (2026, 6, 15, 3),
    (2026, 6, 22, 4),
    // July
    (2026, 7, 6, 1),
    (2026, 7, 13, 2),
    (2026, 7, 20, 3),
    (2026, 7, 27, 4),
    // August
    (2026, 8, 3, 1),
    (2026, 8, 10, 2),
    (2026, 8, 17, 3),
    (2026, 8, 24, 4),
    // September
    (2026, 9, 7, 1),
    (2026, 9, 14, 2),
    (2026, 9, 21, 3),
    (2026, 9, 28, 4),
    // October
    (2026, 10, 5, 1),
    (2026, 10, 12, 2),
    (2026, 10, 19, 3),
    (2026, 10, 26, 4),
    // November
    (2026, 11, 2, 1),
    (2026, 11, 9, 2),
    (2026, 11, 16, 3),
    (2026, 11, 23, 4),
    // December
    (2026, 12, 7, 1),
    (2026, 12, 14, 2),
    (2026, 12, 21, 3),
    (2026, 12, 28, 4),
];

pub const HOLIDAYS: [(i32, u32, u32); 11] = [
    (2026, 1, 1),   // New Year's Day
    (2026, 1, 19),  // MLK Day
    (2026, 2, 16),  // Presidents' Day
    (2026, 3, 31),  // Cesar Chavez Day
    (2026, 5, 25),  // Memorial Day
    (2026, 7, 3),   // Independence Day (observed)
    (2026, 9, 7),   // Labor Day
    (2026, 11, 11), // Veterans Day
    (2026, 11, 26), // Thanksgiving
    (2026, 11, 27), // Day after Thanksgiving
    (2026, 12, 25), // Christmas
];
