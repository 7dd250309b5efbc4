use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::{
    models::Booking,
    services::address::{base_identifier, grouping_key},
};

/// One line of the grouped bookings table: a unit on a date, with at most
/// one departing and one arriving booking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedRow {
    pub address: String,
    pub base_address: String,
    pub date: NaiveDate,
    pub checkout: Option<Booking>,
    pub checkin: Option<Booking>,
    pub is_first_in_group: bool,
    pub is_last_in_group: bool,
    pub is_single_row: bool,
    pub has_duplicate: bool,
}

impl GroupedRow {
    fn new(address: String, date: NaiveDate) -> Self {
        Self {
            base_address: base_identifier(Some(&address)),
            address,
            date,
            checkout: None,
            checkin: None,
            is_first_in_group: false,
            is_last_in_group: false,
            is_single_row: false,
            has_duplicate: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Checkout,
    Checkin,
}

/// Builds the grouped table from active bookings.
///
/// With a filter date a booking departing that day fills the checkout slot
/// and one arriving that day fills the checkin slot; bookings touching
/// neither are dropped. Without a date every booking is a checkin on its
/// begin date. When two bookings land in the same slot the later one in
/// input order replaces the earlier one.
pub fn group_bookings(bookings: &[Booking], filter_date: Option<NaiveDate>) -> Vec<GroupedRow> {
    let mut rows: Vec<GroupedRow> = Vec::new();
    let mut index: HashMap<(String, NaiveDate), usize> = HashMap::new();

    for booking in bookings {
        for (slot, date) in slots_for(booking, filter_date) {
            let address = booking.unit_label().to_string();
            let position = *index
                .entry((address.clone(), date))
                .or_insert_with(|| {
                    rows.push(GroupedRow::new(address, date));
                    rows.len() - 1
                });
            place(&mut rows[position], slot, booking);
        }
    }

    rows.sort_by(|a, b| b.date.cmp(&a.date));
    rows.sort_by_cached_key(|row| (grouping_key(Some(&row.address)), row.address.to_uppercase()));
    mark_duplicate_runs(&mut rows);
    rows
}

fn slots_for(booking: &Booking, filter_date: Option<NaiveDate>) -> Vec<(Slot, NaiveDate)> {
    let Some(day) = filter_date else {
        return vec![(Slot::Checkin, booking.begin_date)];
    };
    let mut slots = Vec::with_capacity(2);
    if booking.end_date == day {
        slots.push((Slot::Checkout, day));
    }
    if booking.begin_date == day {
        slots.push((Slot::Checkin, day));
    }
    if slots.is_empty() {
        tracing::debug!(booking_id = booking.id, %day, "Booking does not touch filter date");
    }
    slots
}

fn place(row: &mut GroupedRow, slot: Slot, booking: &Booking) {
    let target = match slot {
        Slot::Checkout => &mut row.checkout,
        Slot::Checkin => &mut row.checkin,
    };
    if let Some(previous) = target.as_ref() {
        if previous.id != booking.id {
            tracing::warn!(
                address = %row.address,
                date = %row.date,
                slot = ?slot,
                replaced_booking_id = previous.id,
                booking_id = booking.id,
                "Two bookings share a grouped slot, keeping the later one"
            );
        }
    }
    *target = Some(booking.clone());
}

/// Flags contiguous runs of rows that share a base identifier.
fn mark_duplicate_runs(rows: &mut [GroupedRow]) {
    let keys = rows
        .iter()
        .map(|row| grouping_key(Some(&row.address)))
        .collect::<Vec<_>>();

    let mut start = 0;
    while start < rows.len() {
        let mut end = start + 1;
        while end < rows.len() && keys[end] == keys[start] {
            end += 1;
        }
        let size = end - start;
        for (offset, row) in rows[start..end].iter_mut().enumerate() {
            row.is_first_in_group = offset == 0;
            row.is_last_in_group = offset == size - 1;
            row.is_single_row = size == 1;
            row.has_duplicate = size > 1;
        }
        start = end;
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use super::group_bookings;
    use crate::models::{Booking, BookingUpsert};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn booking(id: i64, title: &str, begin: NaiveDate, end: NaiveDate) -> Booking {
        Booking::from_upsert(
            BookingUpsert {
                id,
                action: "create_booking".to_string(),
                status: "booked".to_string(),
                begin_date: begin,
                end_date: end,
                realty_id: 1,
                client_id: None,
                amount: Some(1000.0),
                prepayment: None,
                payment: None,
                platform_tax: None,
                balance_to_be_paid_1: None,
                arrival_time: None,
                departure_time: None,
                notes: None,
                client_fio: None,
                client_phone: None,
                client_email: None,
                apartment_title: Some(title.to_string()),
                apartment_address: None,
                number_of_days: None,
                number_of_nights: None,
                is_delete: false,
                webhook_created_at: None,
                webhook_updated_at: None,
            },
            Utc::now(),
        )
    }

    #[test]
    fn duplicate_units_form_one_contiguous_run() {
        let rows = group_bookings(
            &[
                booking(1, "X", date(2024, 5, 1), date(2024, 5, 5)),
                booking(2, "X ДУБЛЬ", date(2024, 5, 1), date(2024, 5, 5)),
            ],
            None,
        );
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row.base_address == "X"));
        assert!(rows.iter().all(|row| row.has_duplicate && !row.is_single_row));
        assert_eq!(rows.iter().filter(|row| row.is_first_in_group).count(), 1);
        assert_eq!(rows.iter().filter(|row| row.is_last_in_group).count(), 1);
        assert!(rows[0].is_first_in_group && rows[1].is_last_in_group);
        assert_eq!(rows[0].address, "X");
        assert_eq!(rows[1].address, "X ДУБЛЬ");
    }

    #[test]
    fn filter_date_assigns_checkout_and_checkin_slots() {
        let day = date(2024, 5, 5);
        let rows = group_bookings(
            &[
                booking(1, "A", date(2024, 5, 1), day),
                booking(2, "A", day, date(2024, 5, 8)),
                booking(3, "B", date(2024, 5, 3), date(2024, 5, 9)),
            ],
            Some(day),
        );
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.date, day);
        assert_eq!(row.checkout.as_ref().map(|b| b.id), Some(1));
        assert_eq!(row.checkin.as_ref().map(|b| b.id), Some(2));
        assert!(row.is_single_row && row.is_first_in_group && row.is_last_in_group);
        assert!(!row.has_duplicate);
    }

    #[test]
    fn rows_are_address_major_and_date_descending() {
        let rows = group_bookings(
            &[
                booking(1, "b", date(2024, 5, 1), date(2024, 5, 2)),
                booking(2, "A", date(2024, 5, 1), date(2024, 5, 2)),
                booking(3, "A", date(2024, 5, 9), date(2024, 5, 10)),
                booking(4, "001) A дубль", date(2024, 5, 4), date(2024, 5, 6)),
            ],
            None,
        );
        let order = rows
            .iter()
            .map(|row| (row.address.as_str(), row.date))
            .collect::<Vec<_>>();
        assert_eq!(
            order,
            vec![
                ("001) A дубль", date(2024, 5, 4)),
                ("A", date(2024, 5, 9)),
                ("A", date(2024, 5, 1)),
                ("b", date(2024, 5, 1)),
            ]
        );
        assert!(rows[0].is_first_in_group && !rows[0].is_last_in_group);
        assert!(rows[2].is_last_in_group);
        assert!(rows[3].is_single_row);
    }

    #[test]
    fn later_booking_wins_a_slot_collision() {
        let rows = group_bookings(
            &[
                booking(5, "A", date(2024, 5, 1), date(2024, 5, 3)),
                booking(4, "A", date(2024, 5, 1), date(2024, 5, 2)),
            ],
            None,
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].checkin.as_ref().map(|b| b.id), Some(4));
    }

    #[test]
    fn empty_input_yields_no_rows() {
        assert!(group_bookings(&[], Some(date(2024, 1, 1))).is_empty());
    }
}
