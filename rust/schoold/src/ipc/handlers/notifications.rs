use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_opt_str, run, today, Ctx};
use crate::ipc::types::{AppState, Request};
use crate::model::Role;
use crate::notify::{self, Rules, Snapshot};
use crate::store::attendance::{self, AttendanceFilter};
use crate::store::leave::{self, LeaveFilter};
use crate::store::students::{self, StudentFilter};
use crate::store::{schools, users};
use serde_json::{json, Value};

fn notifications_list(ctx: &Ctx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let Some(user_id) = get_opt_str(params, "userId").or_else(|| ctx.actor()) else {
        return Err(HandlerErr::new("unauthenticated", "sign in first"));
    };
    let user = users::get_user(ctx.conn, &user_id)?;
    let today = today(params)?;

    let all_schools = schools::list_schools(ctx.conn)?;
    let (school_list, roster, records, leaves) = match (user.role, user.school_id.clone()) {
        (Role::GeneralManager | Role::Admin, _) | (_, None) => {
            (all_schools, Vec::new(), Vec::new(), Vec::new())
        }
        (_, Some(school_id)) => {
            let own: Vec<_> = all_schools
                .into_iter()
                .filter(|s| s.id == school_id)
                .collect();
            let roster = students::list_students(
                ctx.conn,
                &StudentFilter {
                    school_id: Some(school_id.clone()),
                    grade: None,
                },
            )?;
            let records = attendance::list_records(
                ctx.conn,
                &AttendanceFilter {
                    school_id: Some(school_id.clone()),
                    ..Default::default()
                },
            )?;
            let leaves = leave::list_requests(
                ctx.conn,
                &LeaveFilter {
                    school_id: Some(school_id),
                    ..Default::default()
                },
            )?;
            (own, roster, records, leaves)
        }
    };

    let snap = Snapshot {
        schools: &school_list,
        students: &roster,
        records: &records,
        leaves: &leaves,
    };
    let items = notify::for_user(&user, &snap, &Rules::from(ctx.config), today);
    Ok(json!({ "userId": user.id, "role": user.role, "notifications": items }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "notifications.list" => Some(run(state, req, notifications_list)),
        _ => None,
    }
}
