use std::collections::HashMap;

use csv::Writer;

use crate::{
    error::{AppError, AppResult},
    models::Booking,
    services::{financials::round2, grouping::GroupedRow},
};

const HEADER: [&str; 19] = [
    "Адрес",
    "Статус дома",
    "Выселение: ФИО",
    "Выселение: Телефон",
    "Выселение: Комментарий",
    "Заселение: ФИО",
    "Заселение: Телефон",
    "Дата выселения",
    "Кол-во ночей",
    "Общая сумма",
    "Предоплата",
    "Доплата",
    "Доп. услуги",
    "Комментарий",
    "Комментарии в день заселения",
    "Первая в группе",
    "Последняя в группе",
    "Одиночная",
    "Есть дубль",
];

pub fn house_status(row: &GroupedRow) -> &'static str {
    match (row.checkout.is_some(), row.checkin.is_some()) {
        (true, true) => "Выс/Зас",
        (true, false) => "Выселение",
        (false, true) => "Заселение",
        (false, false) => "",
    }
}

/// Renders grouped rows as CSV. `services_totals` maps a booking id to the
/// sum of its extra services.
pub fn grouped_rows_csv(
    rows: &[GroupedRow],
    services_totals: &HashMap<i64, f64>,
) -> AppResult<Vec<u8>> {
    let mut wtr = Writer::from_writer(Vec::new());
    wtr.write_record(HEADER).map_err(csv_error)?;

    for row in rows {
        let checkout = row.checkout.as_ref();
        let checkin = row.checkin.as_ref();
        let services_total = checkin
            .and_then(|booking| services_totals.get(&booking.id))
            .copied()
            .unwrap_or(0.0);

        wtr.write_record([
            row.address.to_uppercase(),
            house_status(row).to_string(),
            text(checkout, |b| b.client_fio.as_deref()),
            text(checkout, |b| b.client_phone.as_deref()),
            text(checkout, |b| b.notes.as_deref()),
            text(checkin, |b| b.client_fio.as_deref()),
            text(checkin, |b| b.client_phone.as_deref()),
            checkin
                .map(|b| b.end_date.format("%d.%m.%Y").to_string())
                .unwrap_or_default(),
            checkin
                .and_then(|b| b.number_of_nights)
                .map(|nights| nights.to_string())
                .unwrap_or_default(),
            money(checkin.map(Booking::net_amount)),
            money(checkin.map(Booking::net_prepayment)),
            money(checkin.map(Booking::balance_due)),
            money(Some(services_total)),
            text(checkin, |b| b.notes.as_deref()),
            text(checkin, |b| b.checkin_day_comments.as_deref()),
            flag(row.is_first_in_group),
            flag(row.is_last_in_group),
            flag(row.is_single_row),
            flag(row.has_duplicate),
        ])
        .map_err(csv_error)?;
    }

    wtr.flush()
        .map_err(|error| AppError::Internal(format!("CSV export failed: {error}")))?;
    wtr.into_inner()
        .map_err(|error| AppError::Internal(format!("CSV export failed: {error}")))
}

fn text<F>(booking: Option<&Booking>, field: F) -> String
where
    F: Fn(&Booking) -> Option<&str>,
{
    booking.and_then(field).unwrap_or_default().to_string()
}

fn money(value: Option<f64>) -> String {
    format!("{:.2}", round2(value.unwrap_or(0.0)))
}

fn flag(value: bool) -> String {
    if value { "1" } else { "0" }.to_string()
}

fn csv_error(error: csv::Error) -> AppError {
    AppError::Internal(format!("CSV export failed: {error}"))
}
