//! Staff records, daily attendance and monthly salary cycles (event-sourced).

pub mod attendance;
pub mod employee;
pub mod salary_cycle;

pub use attendance::{
    Attendance, AttendanceCommand, AttendanceEvent, AttendanceMarked, AttendanceStatus,
    MarkAttendance, attendance_id,
};
pub use employee::{
    ChangeSalary, CreditSalary, DeactivateEmployee, Employee, EmployeeCommand, EmployeeEvent,
    EmployeeId, EmployeeProfile, EmployeeStatus, PaySalary, ReactivateEmployee, RegisterEmployee,
    UpdateEmployee,
};
pub use salary_cycle::{
    ProcessSalaryCycle, SalaryCredit, SalaryCycle, SalaryCycleCommand, SalaryCycleEvent,
    SalaryCycleProcessed, SalaryPeriod, salary_cycle_id,
};
