use crate::cmd::{open_db, parse_enum, require_org};
use crate::output::{enum_name, print_json, print_table, short_id};
use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Subcommand;
use retention_core::signals::{
    Booking, BookingStatus, CheckIn, Lead, Member, Payment, PaymentStatus,
};
use std::path::Path;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum MemberSubcommand {
    /// Add a member
    Add {
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },

    /// Add a lead (a prospect who is not yet a member)
    Lead {
        first_name: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },

    /// List members
    List,

    /// Record a check-in
    CheckIn {
        member: Uuid,
        /// RFC 3339 timestamp (default: now)
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// Record a class booking
    Booking {
        member: Uuid,
        #[arg(long)]
        class_type: String,
        /// booked, attended, no_show, or canceled
        #[arg(long, default_value = "booked")]
        status: String,
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// Record a payment
    Payment {
        member: Uuid,
        #[arg(long)]
        amount_cents: i64,
        /// paid, pending, overdue, or refunded
        #[arg(long)]
        status: String,
        #[arg(long)]
        due: Option<DateTime<Utc>>,
    },

    /// Mark a member canceled
    Cancel {
        member: Uuid,
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(
    root: &Path,
    org: Option<Uuid>,
    subcmd: MemberSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    let org = require_org(org)?;
    let db = open_db(root)?;
    let now = Utc::now();

    match subcmd {
        MemberSubcommand::Add {
            first_name,
            last_name,
            email,
            phone,
        } => {
            let mut member = Member::new(org, first_name, last_name);
            member.email = email;
            member.phone = phone;
            db.upsert_member(&member).context("failed to save member")?;
            if json {
                return print_json(&member);
            }
            println!("Added member {} ({})", member.id, member.first_name);
        }

        MemberSubcommand::Lead {
            first_name,
            email,
            phone,
        } => {
            let mut lead = Lead::new(org, first_name);
            lead.email = email;
            lead.phone = phone;
            db.upsert_lead(&lead).context("failed to save lead")?;
            if json {
                return print_json(&lead);
            }
            println!("Added lead {} ({})", lead.id, lead.first_name);
        }

        MemberSubcommand::List => {
            let members = db.list_members(org)?;
            if json {
                return print_json(&members);
            }
            if members.is_empty() {
                println!("No members.");
                return Ok(());
            }
            let rows = members
                .iter()
                .map(|m| {
                    vec![
                        short_id(&m.id),
                        format!("{} {}", m.first_name, m.last_name).trim().to_string(),
                        enum_name(&m.status),
                        m.joined_at.format("%Y-%m-%d").to_string(),
                    ]
                })
                .collect();
            print_table(&["ID", "NAME", "STATUS", "JOINED"], rows);
        }

        MemberSubcommand::CheckIn { member, at } => {
            db.member(org, member)?;
            let check_in = CheckIn::new(member, at.unwrap_or(now));
            db.record_check_in(&check_in)?;
            if json {
                return print_json(&check_in);
            }
            println!("Recorded check-in for {member}");
        }

        MemberSubcommand::Booking {
            member,
            class_type,
            status,
            at,
        } => {
            db.member(org, member)?;
            let status: BookingStatus = parse_enum("booking status", &status)?;
            let booking = Booking::new(member, class_type, status, at.unwrap_or(now));
            db.record_booking(&booking)?;
            if json {
                return print_json(&booking);
            }
            println!("Recorded {} booking for {member}", booking.class_type);
        }

        MemberSubcommand::Payment {
            member,
            amount_cents,
            status,
            due,
        } => {
            db.member(org, member)?;
            let status: PaymentStatus = parse_enum("payment status", &status)?;
            let payment = Payment::new(member, amount_cents, status, due);
            db.record_payment(&payment)?;
            if json {
                return print_json(&payment);
            }
            println!("Recorded payment of {amount_cents} cents for {member}");
        }

        MemberSubcommand::Cancel { member, at } => {
            let mut record = db.member(org, member)?;
            record.cancel(at.unwrap_or(now));
            db.upsert_member(&record)?;
            if json {
                return print_json(&record);
            }
            println!("Canceled member {member}");
        }
    }
    Ok(())
}
