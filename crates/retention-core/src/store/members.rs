//! Members, leads, and signal history.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{
    last_json, pair_bounds, pair_key, timeline_bounds, timeline_key, RetentionDb, BOOKINGS,
    CHECK_INS, LEADS, MEMBERS, PAYMENTS,
};
use crate::error::{Result, RetentionError};
use crate::signals::{Booking, CheckIn, Lead, Member, Payment, SignalSource};

impl RetentionDb {
    pub fn upsert_member(&self, member: &Member) -> Result<()> {
        self.write_one(MEMBERS, &pair_key(member.organization_id, member.id), member)
    }

    pub fn member(&self, organization_id: Uuid, member_id: Uuid) -> Result<Member> {
        self.read_one(MEMBERS, &pair_key(organization_id, member_id))?
            .ok_or(RetentionError::MemberNotFound(member_id))
    }

    pub fn list_members(&self, organization_id: Uuid) -> Result<Vec<Member>> {
        let (lo, hi) = pair_bounds(organization_id);
        let mut members: Vec<Member> = self.read_range(MEMBERS, &lo, &hi)?;
        members.sort_by(|a, b| a.joined_at.cmp(&b.joined_at));
        Ok(members)
    }

    pub fn upsert_lead(&self, lead: &Lead) -> Result<()> {
        self.write_one(LEADS, &pair_key(lead.organization_id, lead.id), lead)
    }

    pub fn lead(&self, organization_id: Uuid, lead_id: Uuid) -> Result<Lead> {
        self.read_one(LEADS, &pair_key(organization_id, lead_id))?
            .ok_or(RetentionError::LeadNotFound(lead_id))
    }

    pub fn record_check_in(&self, check_in: &CheckIn) -> Result<()> {
        let key = timeline_key(check_in.member_id, check_in.checked_in_at, check_in.id);
        self.write_one(CHECK_INS, &key, check_in)
    }

    pub fn record_booking(&self, booking: &Booking) -> Result<()> {
        let key = timeline_key(booking.member_id, booking.created_at, booking.id);
        self.write_one(BOOKINGS, &key, booking)
    }

    pub fn record_payment(&self, payment: &Payment) -> Result<()> {
        self.write_one(PAYMENTS, &pair_key(payment.member_id, payment.id), payment)
    }

    /// Every booking of a member, oldest first.
    pub fn bookings(&self, member_id: Uuid) -> Result<Vec<Booking>> {
        let (lo, hi) = timeline_bounds(member_id, None);
        self.read_range(BOOKINGS, &lo, &hi)
    }
}

impl SignalSource for RetentionDb {
    fn last_check_in(&self, member_id: Uuid) -> Result<Option<DateTime<Utc>>> {
        let (lo, hi) = timeline_bounds(member_id, None);
        let rt = self.db.begin_read().map_err(super::db_err)?;
        let t = rt.open_table(CHECK_INS).map_err(super::db_err)?;
        let last: Option<CheckIn> = last_json(&t, &lo, &hi)?;
        Ok(last.map(|c| c.checked_in_at))
    }

    fn bookings_since(&self, member_id: Uuid, since: DateTime<Utc>) -> Result<Vec<Booking>> {
        let (lo, hi) = timeline_bounds(member_id, Some(since));
        self.read_range(BOOKINGS, &lo, &hi)
    }

    fn payments(&self, member_id: Uuid) -> Result<Vec<Payment>> {
        let (lo, hi) = pair_bounds(member_id);
        self.read_range(PAYMENTS, &lo, &hi)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::open_tmp;
    use super::*;
    use crate::signals::{BookingStatus, PaymentStatus};
    use chrono::Duration;

    #[test]
    fn member_is_scoped_to_organization() {
        let (_dir, db) = open_tmp();
        let org = Uuid::new_v4();
        let m = Member::new(org, "Ana", "Lima");
        db.upsert_member(&m).unwrap();
        assert_eq!(db.member(org, m.id).unwrap(), m);
        assert!(matches!(
            db.member(Uuid::new_v4(), m.id),
            Err(RetentionError::MemberNotFound(_))
        ));
    }

    #[test]
    fn list_members_only_returns_one_org() {
        let (_dir, db) = open_tmp();
        let org = Uuid::new_v4();
        let other = Uuid::new_v4();
        db.upsert_member(&Member::new(org, "A", "")).unwrap();
        db.upsert_member(&Member::new(org, "B", "")).unwrap();
        db.upsert_member(&Member::new(other, "C", "")).unwrap();
        assert_eq!(db.list_members(org).unwrap().len(), 2);
        assert_eq!(db.list_members(other).unwrap().len(), 1);
    }

    #[test]
    fn last_check_in_is_most_recent() {
        let (_dir, db) = open_tmp();
        let member = Uuid::new_v4();
        let now = Utc::now();
        assert_eq!(db.last_check_in(member).unwrap(), None);
        db.record_check_in(&CheckIn::new(member, now - Duration::days(1))).unwrap();
        db.record_check_in(&CheckIn::new(member, now - Duration::days(9))).unwrap();
        db.record_check_in(&CheckIn::new(Uuid::new_v4(), now)).unwrap();
        let last = db.last_check_in(member).unwrap().unwrap();
        assert_eq!(last.timestamp_millis(), (now - Duration::days(1)).timestamp_millis());
    }

    #[test]
    fn bookings_since_filters_by_creation_time() {
        let (_dir, db) = open_tmp();
        let member = Uuid::new_v4();
        let now = Utc::now();
        db.record_booking(
            &Booking::new(member, "yoga", BookingStatus::NoShow, now - Duration::days(20)),
        )
            .unwrap();
        db.record_booking(
            &Booking::new(member, "yoga", BookingStatus::NoShow, now - Duration::days(2)),
        )
            .unwrap();
        let recent = db.bookings_since(member, now - Duration::days(14)).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(db.bookings(member).unwrap().len(), 2);
    }

    #[test]
    fn payments_are_per_member() {
        let (_dir, db) = open_tmp();
        let member = Uuid::new_v4();
        db.record_payment(&Payment::new(member, 1000, PaymentStatus::Overdue, None)).unwrap();
        db.record_payment(&Payment::new(Uuid::new_v4(), 1000, PaymentStatus::Paid, None)).unwrap();
        assert_eq!(db.payments(member).unwrap().len(), 1);
    }
}
